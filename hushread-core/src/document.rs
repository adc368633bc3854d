use std::ops::Range;
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::{Lazy, OnceCell};
use thiserror::Error;
use uuid::Uuid;

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d5a8e-61b2-5c47-9a1e-0c8d2b7e4f15").expect("valid namespace UUID")
});

pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("{path} could not be decoded as {encoding}")]
    Undecodable { path: PathBuf, encoding: String },
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: Option<PathBuf>,
    pub encoding: String,
}

impl DocumentInfo {
    /// Last path component, or a placeholder for in-memory text.
    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<untitled>".to_string())
    }
}

/// Immutable decoded text. Offsets index `char`s, so any offset in
/// `0..=len()` is a valid slice boundary.
pub struct Document {
    pub info: DocumentInfo,
    chars: Vec<char>,
    folded: OnceCell<Vec<char>>,
}

impl Document {
    pub fn new(info: DocumentInfo, text: &str) -> Self {
        Self {
            info,
            chars: text.chars().collect(),
            folded: OnceCell::new(),
        }
    }

    /// In-memory document with a fresh random id.
    pub fn from_text(text: &str) -> Self {
        let info = DocumentInfo {
            id: Uuid::new_v4(),
            path: None,
            encoding: UTF_8.name().to_string(),
        };
        Self::new(info, text)
    }

    pub fn id(&self) -> DocumentId {
        self.info.id
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Chars in `start..end`, with both ends clamped to the document.
    pub fn chars(&self, range: Range<usize>) -> &[char] {
        let end = range.end.min(self.chars.len());
        let start = range.start.min(end);
        &self.chars[start..end]
    }

    pub fn slice(&self, start: usize, end: usize) -> String {
        self.chars(start..end).iter().collect()
    }

    /// Lower-cased copy used by search. Each char folds to exactly one char so
    /// offsets line up with the unfolded text.
    pub fn folded(&self) -> &[char] {
        self.folded
            .get_or_init(|| self.chars.iter().map(|&c| fold_char(c)).collect())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("info", &self.info)
            .field("len", &self.chars.len())
            .finish()
    }
}

/// Simple lowercase mapping. Characters whose lowercase form expands to
/// several chars are left as they are.
pub fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

/// Detects the encoding of `bytes` and decodes them. Returns the text and the
/// name of the encoding used.
pub fn decode_text(path: &Path, bytes: &[u8]) -> Result<(String, String), DocumentError> {
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None => detect_encoding(bytes),
    };
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DocumentError::Undecodable {
            path: path.to_path_buf(),
            encoding: used.name().to_string(),
        });
    }
    Ok((text.into_owned(), used.name().to_string()))
}

fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}
