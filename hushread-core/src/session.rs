use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::document::{Document, DocumentId, DocumentInfo};
use crate::fit::TextFitter;
use crate::history::NavigationHistory;
use crate::loader::LoadedDocument;
use crate::pager::{Page, Pager, PagerOptions};
use crate::progress::{offset_for_percent, percent, percent_rounded, ProgressTracker};
use crate::search::{SearchCursor, SearchDirection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NextPage { count: usize },
    PrevPage { count: usize },
    JumpToOffset { offset: usize },
    JumpToPercent { percent: u8 },
    Search { query: String, backwards: bool },
    SearchNext,
    SearchPrev,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Replaces the current document.
    Load(LoadedDocument),
    Command(Command),
    /// The fitter's viewport changed.
    Resized,
    /// Settings that influence layout changed.
    SettingsChanged,
    /// Lets expired save timers fire.
    Tick,
    /// Emits any pending save immediately, e.g. before exit.
    Flush,
}

/// What the host should paint for the current page.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub document: DocumentId,
    pub page: Page,
    pub text: String,
    /// Whole-number progress, `0..=100`.
    pub percent: u8,
    pub exact_percent: f64,
}

/// Save request for the reading position. Carries the document's identity
/// since the document may have been replaced by the time it is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistRequest {
    pub document: DocumentInfo,
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NotFound { query: String },
    StartOfHistory,
    EndOfDocument,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render(RenderFrame),
    Persist(PersistRequest),
    Notice(Notice),
}

/// Reading state of the one open document. All mutation happens inside
/// [`ReaderSession::handle`]; side effects are returned to the host.
pub struct ReaderSession<F: TextFitter> {
    fitter: F,
    pager: Pager,
    document: Option<Arc<Document>>,
    page: Page,
    history: NavigationHistory,
    search: SearchCursor,
    progress: ProgressTracker,
}

impl<F: TextFitter> ReaderSession<F> {
    pub fn new(fitter: F, options: PagerOptions, debounce: Duration) -> Self {
        Self {
            fitter,
            pager: Pager::new(options),
            document: None,
            page: Page::default(),
            history: NavigationHistory::new(),
            search: SearchCursor::new(),
            progress: ProgressTracker::new(debounce),
        }
    }

    pub fn fitter(&self) -> &F {
        &self.fitter
    }

    /// Hosts update the surface here, then send [`SessionEvent::Resized`] or
    /// [`SessionEvent::SettingsChanged`].
    pub fn fitter_mut(&mut self) -> &mut F {
        &mut self.fitter
    }

    pub fn set_pager_options(&mut self, options: PagerOptions) {
        self.pager.set_options(options);
    }

    pub fn set_debounce(&mut self, debounce: Duration) {
        self.progress.set_delay(debounce);
    }

    pub fn document(&self) -> Option<&Arc<Document>> {
        self.document.as_ref()
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn last_query(&self) -> Option<&str> {
        self.search.last_query()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.progress.next_deadline()
    }

    pub fn percent(&self) -> f64 {
        self.document
            .as_ref()
            .map_or(0.0, |doc| percent(self.page.start, doc.len()))
    }

    pub fn current_frame(&self) -> Option<RenderFrame> {
        let doc = self.document.as_ref()?;
        Some(RenderFrame {
            document: doc.id(),
            page: self.page,
            text: doc.slice(self.page.start, self.page.end),
            percent: percent_rounded(self.page.start, doc.len()),
            exact_percent: percent(self.page.start, doc.len()),
        })
    }

    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            SessionEvent::Load(loaded) => self.load(loaded, now, &mut effects),
            SessionEvent::Command(command) => self.apply(command, now, &mut effects),
            SessionEvent::Resized | SessionEvent::SettingsChanged => {
                if self.document.is_some() {
                    self.show(self.page.start, false, now, &mut effects);
                }
            }
            SessionEvent::Tick => {
                if let Some(offset) = self.progress.poll(now) {
                    self.push_persist(offset, &mut effects);
                }
            }
            SessionEvent::Flush => {
                if let Some(offset) = self.progress.flush() {
                    self.push_persist(offset, &mut effects);
                }
            }
        }
        effects
    }

    fn load(&mut self, loaded: LoadedDocument, now: Instant, effects: &mut Vec<Effect>) {
        // A pending save belongs to the outgoing document.
        if let Some(offset) = self.progress.flush() {
            self.push_persist(offset, effects);
        }
        let offset = loaded
            .offset
            .min(loaded.document.len().saturating_sub(1));
        info!(id = %loaded.document.id(), offset, "opening document");
        self.document = Some(loaded.document);
        self.history.clear();
        self.search.reset();
        self.page = Page::empty_at(offset);
        self.show(offset, true, now, effects);
    }

    fn apply(&mut self, command: Command, now: Instant, effects: &mut Vec<Effect>) {
        let Some(doc) = self.document.clone() else {
            debug!(?command, "ignoring command without a document");
            return;
        };
        match command {
            Command::NextPage { count } => {
                for _ in 0..count.max(1) {
                    if self.page.end >= doc.len() || self.page.end <= self.page.start {
                        effects.push(Effect::Notice(Notice::EndOfDocument));
                        break;
                    }
                    self.show(self.page.end, true, now, effects);
                }
            }
            Command::PrevPage { count } => {
                for _ in 0..count.max(1) {
                    match self.history.go_back() {
                        Some(offset) => self.show(offset, false, now, effects),
                        None => {
                            effects.push(Effect::Notice(Notice::StartOfHistory));
                            break;
                        }
                    }
                }
            }
            Command::JumpToOffset { offset } => self.jump(&doc, offset, now, effects),
            Command::JumpToPercent { percent } => {
                self.jump(&doc, offset_for_percent(percent, doc.len()), now, effects)
            }
            Command::Search { query, .. } if query.trim().is_empty() => {
                debug!("ignoring blank search");
            }
            Command::Search { query, backwards } => {
                let direction = if backwards {
                    SearchDirection::Backward
                } else {
                    SearchDirection::Forward
                };
                let found = self.search.search(&doc, &query, self.page, direction);
                self.finish_search(&doc, found, now, effects);
            }
            Command::SearchNext => {
                let found = self.search.repeat(&doc, self.page, SearchDirection::Forward);
                self.finish_search(&doc, found, now, effects);
            }
            Command::SearchPrev => {
                let found = self.search.repeat(&doc, self.page, SearchDirection::Backward);
                self.finish_search(&doc, found, now, effects);
            }
        }
    }

    fn finish_search(
        &mut self,
        doc: &Document,
        found: Option<usize>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match found {
            Some(offset) => self.jump(doc, offset, now, effects),
            None => {
                if let Some(query) = self.search.last_query() {
                    debug!(query, "no match");
                    effects.push(Effect::Notice(Notice::NotFound {
                        query: query.to_string(),
                    }));
                }
            }
        }
    }

    fn jump(&mut self, doc: &Document, offset: usize, now: Instant, effects: &mut Vec<Effect>) {
        let last_start = doc.len().saturating_sub(1);
        self.show(offset.min(last_start), true, now, effects);
    }

    /// Paginates from `start`, renders, and arms the save timer.
    fn show(&mut self, start: usize, push: bool, now: Instant, effects: &mut Vec<Effect>) {
        let Some(doc) = self.document.clone() else {
            return;
        };
        self.page = self.pager.paginate(&doc, start, &self.fitter);
        if push {
            self.history.push(self.page.start);
        }
        if let Some(frame) = self.current_frame() {
            effects.push(Effect::Render(frame));
        }
        self.progress.schedule(self.page.start, now);
    }

    fn push_persist(&self, offset: usize, effects: &mut Vec<Effect>) {
        if let Some(doc) = &self.document {
            effects.push(Effect::Persist(PersistRequest {
                document: doc.info.clone(),
                offset,
                len: doc.len(),
            }));
        }
    }
}
