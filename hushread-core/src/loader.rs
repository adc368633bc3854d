use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::document::{decode_text, document_id_for_path, Document, DocumentError, DocumentInfo};
use crate::store::ProgressStore;

/// A freshly loaded document and the offset to resume reading at.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Arc<Document>,
    pub offset: usize,
}

#[async_trait::async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<LoadedDocument>;

    /// The most recently read document, if it can still be opened.
    async fn current(&self) -> Result<Option<LoadedDocument>>;
}

pub struct FileDocumentLoader {
    store: Arc<dyn ProgressStore>,
}

impl FileDocumentLoader {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }
}

pub async fn read_document(path: &Path) -> Result<Document, DocumentError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            DocumentError::NotFound(path.to_path_buf())
        } else {
            DocumentError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let (text, encoding) = decode_text(path, &bytes)?;
    let info = DocumentInfo {
        id: document_id_for_path(path),
        // Absolute, so the recent-document entry survives a change of cwd.
        path: Some(path.canonicalize().unwrap_or_else(|_| path.to_path_buf())),
        encoding,
    };
    Ok(Document::new(info, &text))
}

#[async_trait::async_trait]
impl DocumentLoader for FileDocumentLoader {
    #[instrument(skip(self))]
    async fn load(&self, path: &Path) -> Result<LoadedDocument> {
        let document = read_document(path).await?;
        let offset = match self.store.load(&document.info) {
            Ok(progress) => progress.map_or(0, |progress| progress.offset),
            Err(err) => {
                warn!(?err, "ignoring unreadable reading progress");
                0
            }
        };
        let offset = offset.min(document.len());
        info!(
            len = document.len(),
            encoding = %document.info.encoding,
            offset,
            "loaded document"
        );
        Ok(LoadedDocument {
            document: Arc::new(document),
            offset,
        })
    }

    #[instrument(skip(self))]
    async fn current(&self) -> Result<Option<LoadedDocument>> {
        let Some(path) = self.store.last_document()? else {
            return Ok(None);
        };
        match self.load(&path).await {
            Ok(loaded) => Ok(Some(loaded)),
            Err(err) => {
                warn!(?err, ?path, "last document could not be restored");
                Ok(None)
            }
        }
    }
}
