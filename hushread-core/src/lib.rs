//! Pagination engine and reading state for a plain-text reader.
//!
//! The [`Pager`] finds, for any start offset, the longest run of text the host
//! surface can show, using only a yes/no [`TextFitter`] and snapping the end to
//! a natural break. [`ReaderSession`] layers history, search and debounced
//! progress saving on top and reports what to paint as [`Effect`]s.

pub mod breaks;
pub mod config;
pub mod document;
pub mod fit;
pub mod history;
pub mod loader;
pub mod pager;
pub mod progress;
pub mod search;
pub mod session;
pub mod store;

pub use breaks::{find_break, BREAK_WINDOW};
pub use config::{load_config, save_config, try_load_config, AppConfig, ConfigError, LayoutConfig, ReadingConfig};
pub use document::{decode_text, document_id_for_path, Document, DocumentError, DocumentId, DocumentInfo};
pub use fit::{TextFitter, Viewport};
pub use history::NavigationHistory;
pub use loader::{read_document, DocumentLoader, FileDocumentLoader, LoadedDocument};
pub use pager::{correct_fit, Page, Pager, PagerOptions};
pub use progress::{offset_for_percent, percent, percent_rounded, ProgressTracker};
pub use search::{SearchCursor, SearchDirection};
pub use session::{Command, Effect, Notice, PersistRequest, ReaderSession, RenderFrame, SessionEvent};
pub use store::{FileProgressStore, MemoryProgressStore, ProgressStore, ReadingProgress};
