use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::terminal;
use directories::ProjectDirs;
use hushread_core::{
    load_config, offset_for_percent, try_load_config, AppConfig, Command, DocumentLoader, Effect,
    FileDocumentLoader, FileProgressStore, LoadedDocument, MemoryProgressStore, Notice,
    PersistRequest, ProgressStore, ReaderSession, ReadingProgress, RenderFrame, SessionEvent,
};
use hushread_tty::{
    render_row, EventMapper, InputMode, LayoutSettings, PageRenderer, TerminalFitter, UiEvent,
};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(
    name = "hushread",
    version,
    about = "Quiet plain-text reader for the terminal"
)]
struct Args {
    /// Text file to open; the last document is reopened when omitted
    file: Option<PathBuf>,

    /// Start at this char offset instead of the saved position
    #[arg(long, conflicts_with = "percent")]
    offset: Option<usize>,

    /// Start at this percentage of the document
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    percent: Option<u8>,

    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print every page for a fixed terminal size and exit
    #[arg(long, requires = "file")]
    dump: bool,

    /// Terminal width used by --dump
    #[arg(long, default_value_t = 80)]
    columns: u16,

    /// Terminal height used by --dump
    #[arg(long, default_value_t = 24)]
    rows: u16,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.dump {
        return run_dump(&args).await;
    }

    let project_dirs = ProjectDirs::from("net", "hushread", "hushread")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
    let mut config = load_config(&config_path);

    let state_dir = project_dirs.data_local_dir().join("state");
    let store: Arc<dyn ProgressStore> = Arc::new(FileProgressStore::new(state_dir)?);
    let loader = FileDocumentLoader::new(store.clone());
    let loaded = open_initial(&loader, &args, &config).await?;

    let (columns, rows) = terminal::size()?;
    let fitter = TerminalFitter::for_terminal(columns, rows, LayoutSettings::from(&config.layout));
    let mut session = ReaderSession::new(fitter, config.pager_options(), config.reading.debounce);

    let (reload_tx, reload_rx) = mpsc::channel();
    let _watcher = match watch_config(&config_path, reload_tx) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!(?err, path = %config_path.display(), "config hot reload disabled");
            None
        }
    };

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut screen = Screen {
        renderer: PageRenderer::new(stdout),
        mapper: EventMapper::new(),
        frame: None,
        notice: None,
        columns,
        rows,
        dirty: true,
    };

    let effects = session.handle(SessionEvent::Load(loaded), Instant::now());
    screen.apply(effects, store.as_ref());

    loop {
        if screen.dirty {
            screen.redraw(&session)?;
        }

        if config_changed(&reload_rx) {
            match try_load_config(&config_path) {
                Ok(next) if next != config => {
                    info!(path = %config_path.display(), "reloaded configuration");
                    session
                        .fitter_mut()
                        .set_layout(LayoutSettings::from(&next.layout));
                    session.set_pager_options(next.pager_options());
                    session.set_debounce(next.reading.debounce);
                    config = next;
                    let effects = session.handle(SessionEvent::SettingsChanged, Instant::now());
                    screen.apply(effects, store.as_ref());
                }
                Ok(_) => {}
                Err(err) => warn!(?err, "keeping previous configuration"),
            }
        }

        let timeout = poll_timeout(session.next_deadline(), Instant::now());
        if event::poll(timeout)? {
            let action = match event::read()? {
                Event::Resize(columns, rows) => {
                    debug!(columns, rows, "terminal resized");
                    session.fitter_mut().resize(columns, rows);
                    screen.columns = columns;
                    screen.rows = rows;
                    let effects = session.handle(SessionEvent::Resized, Instant::now());
                    screen.apply(effects, store.as_ref());
                    LoopAction::Continue
                }
                ev => {
                    let ui_event = screen.mapper.map_event(ev);
                    handle_event(ui_event, &mut session, &mut screen, store.as_ref())?
                }
            };
            if matches!(action, LoopAction::Quit) {
                break;
            }
        }

        let effects = session.handle(SessionEvent::Tick, Instant::now());
        screen.apply(effects, store.as_ref());
    }

    let effects = session.handle(SessionEvent::Flush, Instant::now());
    screen.apply(effects, store.as_ref());
    screen.renderer.clear_all()?;
    Ok(())
}

enum LoopAction {
    Continue,
    Quit,
}

/// Everything the interactive loop paints, plus the input state behind the
/// status line.
struct Screen<W: Write> {
    renderer: PageRenderer<W>,
    mapper: EventMapper,
    frame: Option<RenderFrame>,
    notice: Option<Notice>,
    columns: u16,
    rows: u16,
    dirty: bool,
}

impl<W: Write> Screen<W> {
    fn apply(&mut self, effects: Vec<Effect>, store: &dyn ProgressStore) {
        for effect in effects {
            match effect {
                Effect::Render(frame) => {
                    self.frame = Some(frame);
                    self.dirty = true;
                }
                Effect::Persist(request) => persist(store, &request),
                Effect::Notice(notice) => {
                    self.notice = Some(notice);
                    self.dirty = true;
                }
            }
        }
    }

    fn redraw(&mut self, session: &ReaderSession<TerminalFitter>) -> Result<()> {
        if let Some(frame) = &self.frame {
            self.renderer.draw_page(&frame.text, session.fitter())?;
        }
        self.draw_status(session)?;
        self.dirty = false;
        Ok(())
    }

    fn draw_status(&mut self, session: &ReaderSession<TerminalFitter>) -> Result<()> {
        let name = session
            .document()
            .map(|doc| doc.info.display_name())
            .unwrap_or_default();
        let pending = self.mapper.pending_input();
        let status = format_status(
            &name,
            session.percent(),
            pending.as_deref(),
            self.notice.as_ref(),
        );
        self.renderer.draw_status(&status, self.columns, self.rows)
    }
}

fn handle_event<W: Write>(
    event: UiEvent,
    session: &mut ReaderSession<TerminalFitter>,
    screen: &mut Screen<W>,
    store: &dyn ProgressStore,
) -> Result<LoopAction> {
    screen.notice = None;
    let command = match event {
        UiEvent::Command(command) => command,
        UiEvent::SearchSubmit { query, backwards } => Command::Search { query, backwards },
        UiEvent::BeginSearch { .. } | UiEvent::SearchQueryChanged { .. } | UiEvent::SearchCancel => {
            screen.draw_status(session)?;
            return Ok(LoopAction::Continue);
        }
        UiEvent::Redraw => {
            screen.renderer.clear_all()?;
            screen.dirty = true;
            return Ok(LoopAction::Continue);
        }
        UiEvent::Quit => return Ok(LoopAction::Quit),
        UiEvent::None => {
            // Count prefixes still show up in the status line.
            if screen.mapper.mode() == InputMode::Normal {
                screen.draw_status(session)?;
            }
            return Ok(LoopAction::Continue);
        }
    };
    let effects = session.handle(SessionEvent::Command(command), Instant::now());
    screen.apply(effects, store);
    screen.dirty = true;
    Ok(LoopAction::Continue)
}

fn persist(store: &dyn ProgressStore, request: &PersistRequest) {
    let progress = ReadingProgress::at(request.offset, request.len);
    match store.save(&request.document, &progress) {
        Ok(()) => debug!(id = %request.document.id, offset = request.offset, "saved progress"),
        Err(err) => warn!(?err, id = %request.document.id, "failed to save progress"),
    }
}

async fn open_initial(
    loader: &FileDocumentLoader,
    args: &Args,
    config: &AppConfig,
) -> Result<LoadedDocument> {
    let mut loaded = match &args.file {
        Some(path) => loader
            .load(path)
            .await
            .with_context(|| format!("failed to open {:?}", path))?,
        None if config.reading.restore_last => loader
            .current()
            .await?
            .ok_or_else(|| anyhow!("no input file provided and nothing to restore"))?,
        None => return Err(anyhow!("no input file provided")),
    };
    if let Some(offset) = start_override(args, loaded.document.len()) {
        loaded.offset = offset;
    }
    Ok(loaded)
}

fn start_override(args: &Args, len: usize) -> Option<usize> {
    match (args.offset, args.percent) {
        (Some(offset), _) => Some(offset.min(len)),
        (None, Some(percent)) => Some(offset_for_percent(percent, len)),
        (None, None) => None,
    }
}

/// Pages through the whole file against a fixed-size terminal and prints
/// each page as it would be wrapped on screen.
async fn run_dump(args: &Args) -> Result<()> {
    init_stderr_logging()?;
    let path = args
        .file
        .as_ref()
        .ok_or_else(|| anyhow!("--dump needs a file"))?;
    let config = match &args.config {
        Some(config_path) => load_config(config_path),
        None => AppConfig::default(),
    };

    let loader = FileDocumentLoader::new(Arc::new(MemoryProgressStore::new()));
    let mut loaded = loader
        .load(path)
        .await
        .with_context(|| format!("failed to open {:?}", path))?;
    loaded.offset = start_override(args, loaded.document.len()).unwrap_or(0);

    let fitter = TerminalFitter::for_terminal(
        args.columns,
        args.rows,
        LayoutSettings::from(&config.layout),
    );
    let mut session = ReaderSession::new(fitter, config.pager_options(), config.reading.debounce);
    let now = Instant::now();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut number = 1;
    let mut effects = session.handle(SessionEvent::Load(loaded), now);
    loop {
        let mut finished = false;
        for effect in effects {
            match effect {
                Effect::Render(frame) => {
                    write_dump_page(&mut out, number, &frame, session.fitter())?;
                    number += 1;
                }
                Effect::Notice(Notice::EndOfDocument) => finished = true,
                _ => {}
            }
        }
        if finished {
            break;
        }
        effects = session.handle(SessionEvent::Command(Command::NextPage { count: 1 }), now);
    }
    out.flush()?;
    Ok(())
}

fn write_dump_page(
    out: &mut impl Write,
    number: usize,
    frame: &RenderFrame,
    fitter: &TerminalFitter,
) -> Result<()> {
    writeln!(
        out,
        "--- page {} @{}..{} ({:.1}%) ---",
        number, frame.page.start, frame.page.end, frame.exact_percent
    )?;
    let chars: Vec<char> = frame.text.chars().collect();
    for row in fitter.rows(&chars) {
        writeln!(out, "{}", render_row(&chars[row]))?;
    }
    Ok(())
}

fn format_status(
    name: &str,
    percent: f64,
    pending_input: Option<&str>,
    notice: Option<&Notice>,
) -> String {
    let mut status = format!("{} {:.1}%", name, percent);
    if let Some(notice) = notice {
        status.push_str(" | ");
        status.push_str(&describe_notice(notice));
    }
    if let Some(pending) = pending_input.filter(|s| !s.is_empty()) {
        status.push_str(" | ");
        status.push_str(pending);
    }
    status
}

fn describe_notice(notice: &Notice) -> String {
    match notice {
        Notice::NotFound { query } => format!("not found: {}", query),
        Notice::StartOfHistory => "at first page".to_string(),
        Notice::EndOfDocument => "end of document".to_string(),
    }
}

/// Waits no longer than the next progress save is due.
fn poll_timeout(deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(now).min(POLL_INTERVAL),
        None => POLL_INTERVAL,
    }
}

fn watch_config(path: &Path, tx: Sender<()>) -> Result<RecommendedWatcher> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    fs::create_dir_all(&dir)?;
    let file_name = path.file_name().map(|name| name.to_os_string());
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else {
            return;
        };
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        let ours = event
            .paths
            .iter()
            .any(|changed| changed.file_name().map(|name| name.to_os_string()) == file_name);
        if ours {
            let _ = tx.send(());
        }
    })?;
    // Editors often replace the file, so watch the directory.
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Drains pending change signals.
fn config_changed(rx: &Receiver<()>) -> bool {
    let mut changed = false;
    while rx.try_recv().is_ok() {
        changed = true;
    }
    changed
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "hushread.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the reader, so events only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

fn init_stderr_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err))
}
