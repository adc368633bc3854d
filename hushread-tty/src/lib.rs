use std::io::{self, Write};
use std::ops::Range;

use anyhow::Result;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    style::Print,
    terminal::{Clear, ClearType},
};
use hushread_core::{Command, Document, LayoutConfig, TextFitter, Viewport};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

pub const TAB_WIDTH: usize = 4;

/// Terminal cells taken by `c`. Control characters other than tab take none.
pub fn cell_width(c: char) -> usize {
    match c {
        '\t' => TAB_WIDTH,
        c if c.is_control() => 0,
        c => c.width().unwrap_or(0),
    }
}

/// Splits text into the char ranges of its visual rows: a row ends at a
/// newline (which belongs to no row) or before the char that would overflow
/// `columns`. A char wider than the whole row still gets a row of its own.
pub struct RowIter<'a> {
    text: &'a [char],
    columns: usize,
    pos: usize,
}

impl<'a> RowIter<'a> {
    pub fn new(text: &'a [char], columns: usize) -> Self {
        Self {
            text,
            columns: columns.max(1),
            pos: 0,
        }
    }
}

impl Iterator for RowIter<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let start = self.pos;
        let mut width = 0;
        while self.pos < self.text.len() {
            let c = self.text[self.pos];
            if c == '\n' {
                self.pos += 1;
                return Some(start..self.pos - 1);
            }
            let w = cell_width(c);
            if width + w > self.columns && self.pos > start {
                break;
            }
            width += w;
            self.pos += 1;
        }
        Some(start..self.pos)
    }
}

/// Printable form of one visual row.
pub fn render_row(row: &[char]) -> String {
    let mut out = String::with_capacity(row.len());
    for &c in row {
        match c {
            '\t' => out.push_str(&" ".repeat(TAB_WIDTH)),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Longest prefix of `text` that takes at most `columns` cells.
pub fn truncate_to_width(text: &str, columns: usize) -> &str {
    let mut used = 0;
    for (index, c) in text.char_indices() {
        used += cell_width(c);
        if used > columns {
            return &text[..index];
        }
    }
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutSettings {
    pub margin: u16,
    pub line_spacing: u16,
    pub max_chars_per_page: usize,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for LayoutSettings {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            margin: config.margin,
            line_spacing: config.line_spacing.max(1),
            max_chars_per_page: config.max_chars_per_page,
        }
    }
}

impl LayoutSettings {
    /// Text area left in a terminal of the given size once the side margins
    /// and the status line are taken out.
    pub fn text_viewport(&self, columns: u16, rows: u16) -> Viewport {
        let columns = u32::from(columns).saturating_sub(2 * u32::from(self.margin));
        let rows = u32::from(rows).saturating_sub(1);
        Viewport::new(columns, rows)
    }

    /// Number of text rows that fit in `rows` terminal rows.
    fn text_rows(&self, rows: u32) -> usize {
        let spacing = u32::from(self.line_spacing.max(1));
        ((rows + spacing - 1) / spacing) as usize
    }
}

/// Fit oracle for a terminal: a slice fits when its wrapped rows, spaced out
/// by the line spacing, fit in the text area.
#[derive(Debug, Clone)]
pub struct TerminalFitter {
    viewport: Viewport,
    layout: LayoutSettings,
}

impl TerminalFitter {
    pub fn new(viewport: Viewport, layout: LayoutSettings) -> Self {
        Self { viewport, layout }
    }

    pub fn for_terminal(columns: u16, rows: u16, layout: LayoutSettings) -> Self {
        Self::new(layout.text_viewport(columns, rows), layout)
    }

    pub fn resize(&mut self, columns: u16, rows: u16) {
        self.viewport = self.layout.text_viewport(columns, rows);
        debug!(viewport = ?self.viewport, "text area resized");
    }

    /// Changes layout settings, keeping the terminal size.
    pub fn set_layout(&mut self, layout: LayoutSettings) {
        let columns = self.viewport.columns + 2 * u32::from(self.layout.margin);
        let rows = self.viewport.rows + 1;
        self.layout = layout;
        self.viewport = Viewport::new(
            columns.saturating_sub(2 * u32::from(layout.margin)),
            rows.saturating_sub(1),
        );
    }

    pub fn layout(&self) -> LayoutSettings {
        self.layout
    }

    pub fn rows<'a>(&self, text: &'a [char]) -> RowIter<'a> {
        RowIter::new(text, self.viewport.columns as usize)
    }
}

impl TextFitter for TerminalFitter {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn fits(&self, doc: &Document, start: usize, end: usize) -> bool {
        if self.layout.max_chars_per_page > 0 && end - start > self.layout.max_chars_per_page {
            return false;
        }
        let allowed = self.layout.text_rows(self.viewport.rows);
        self.rows(doc.chars(start..end)).take(allowed + 1).count() <= allowed
    }
}

pub struct PageRenderer<W: Write> {
    writer: W,
}

impl<W: Write> PageRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Clears the screen and draws `text` wrapped the same way the fitter
    /// measured it.
    pub fn draw_page(&mut self, text: &str, fitter: &TerminalFitter) -> Result<()> {
        let layout = fitter.layout();
        let chars: Vec<char> = text.chars().collect();
        crossterm::queue!(&mut self.writer, Clear(ClearType::All))?;
        for (index, row) in fitter.rows(&chars).enumerate() {
            let line = index * usize::from(layout.line_spacing.max(1));
            if line >= fitter.viewport().rows as usize {
                break;
            }
            crossterm::queue!(
                &mut self.writer,
                cursor::MoveTo(layout.margin, line as u16),
                Print(render_row(&chars[row]))
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Replaces the bottom line of a `columns` x `rows` terminal with
    /// `status`, cut to fit the line so it never wraps.
    pub fn draw_status(&mut self, status: &str, columns: u16, rows: u16) -> Result<()> {
        crossterm::queue!(
            &mut self.writer,
            cursor::MoveTo(0, rows.saturating_sub(1)),
            Clear(ClearType::CurrentLine)
        )?;
        write_status_line(&mut self.writer, truncate_to_width(status, usize::from(columns)))?;
        Ok(())
    }

    /// Clears the entire screen.
    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Command(Command),
    BeginSearch { backwards: bool },
    SearchQueryChanged { query: String },
    SearchSubmit { query: String, backwards: bool },
    SearchCancel,
    Redraw,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Search { backwards: bool },
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    search_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.search_buffer.clear();
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent { kind, .. }) if kind == KeyEventKind::Release => UiEvent::None,
            Event::Key(key) => match self.mode {
                InputMode::Normal => self.map_key_normal(key),
                InputMode::Search { backwards } => self.map_key_search(key, backwards),
            },
            _ => UiEvent::None,
        }
    }

    fn map_key_normal(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            (KeyCode::Char('l'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.reset_count();
                UiEvent::Redraw
            }
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('%'), _) => match self.pending_count.take() {
                Some(count) => {
                    self.pending_digits.clear();
                    let percent = count.min(100) as u8;
                    UiEvent::Command(Command::JumpToPercent { percent })
                }
                None => UiEvent::None,
            },
            (KeyCode::Char('j' | 'l' | ' '), KeyModifiers::NONE)
            | (KeyCode::Down | KeyCode::Right | KeyCode::PageDown | KeyCode::Enter, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::NextPage { count })
            }
            (KeyCode::Char('k' | 'h'), KeyModifiers::NONE)
            | (KeyCode::Up | KeyCode::Left | KeyCode::PageUp | KeyCode::Backspace, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::PrevPage { count })
            }
            (KeyCode::Char('/'), _) => {
                self.set_mode(InputMode::Search { backwards: false });
                UiEvent::BeginSearch { backwards: false }
            }
            (KeyCode::Char('?'), _) => {
                self.set_mode(InputMode::Search { backwards: true });
                UiEvent::BeginSearch { backwards: true }
            }
            (KeyCode::Char('n'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::SearchNext)
            }
            (KeyCode::Char('N'), modifiers)
                if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
            {
                self.reset_count();
                UiEvent::Command(Command::SearchPrev)
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                self.reset_count();
                UiEvent::Command(Command::JumpToOffset { offset: 0 })
            }
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
                self.reset_count();
                UiEvent::Command(Command::JumpToPercent { percent: 100 })
            }
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_search(&mut self, key: KeyEvent, backwards: bool) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::SearchCancel
            }
            (KeyCode::Enter, _) => {
                let query = std::mem::take(&mut self.search_buffer);
                self.set_mode(InputMode::Normal);
                UiEvent::SearchSubmit { query, backwards }
            }
            (KeyCode::Backspace, _) => {
                self.search_buffer.pop();
                UiEvent::SearchQueryChanged {
                    query: self.search_buffer.clone(),
                }
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.search_buffer.push(c);
                UiEvent::SearchQueryChanged {
                    query: self.search_buffer.clone(),
                }
            }
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    /// What the user has typed but not completed: a count prefix or the
    /// search prompt.
    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::Search { backwards } => {
                let prompt = if backwards { '?' } else { '/' };
                Some(format!("{}{}", prompt, self.search_buffer))
            }
            InputMode::Normal if !self.pending_digits.is_empty() => {
                Some(self.pending_digits.clone())
            }
            InputMode::Normal => None,
        }
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
