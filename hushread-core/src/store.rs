use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::document::{DocumentId, DocumentInfo};
use crate::progress::percent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReadingProgress {
    pub offset: usize,
    pub percent: f64,
    /// Unix seconds of the last save.
    pub updated_at: u64,
}

impl ReadingProgress {
    pub fn at(offset: usize, len: usize) -> Self {
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Self {
            offset,
            percent: percent(offset, len),
            updated_at,
        }
    }
}

pub trait ProgressStore: Send + Sync {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<ReadingProgress>>;
    /// Saves the position and records `doc` as the most recently read file.
    fn save(&self, doc: &DocumentInfo, progress: &ReadingProgress) -> Result<()>;
    fn last_document(&self) -> Result<Option<PathBuf>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RecentDocument {
    path: PathBuf,
}

pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn progress_path(&self, id: DocumentId) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    fn recent_path(&self) -> PathBuf {
        self.root.join("recent.json")
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path).with_context(|| format!("failed to open state file {:?}", path))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    let value = serde_json::from_str(&buf)
        .with_context(|| format!("failed to decode state file {:?}", path))?;
    Ok(Some(value))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(value)?;
    let mut file =
        File::create(&tmp).with_context(|| format!("failed to open temp state file {:?}", tmp))?;
    file.write_all(payload.as_bytes())?;
    file.flush()?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace state file {:?}", path))?;
    Ok(())
}

impl ProgressStore for FileProgressStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<ReadingProgress>> {
        read_json(&self.progress_path(doc.id))
    }

    fn save(&self, doc: &DocumentInfo, progress: &ReadingProgress) -> Result<()> {
        write_json_atomic(&self.progress_path(doc.id), progress)?;
        if let Some(path) = &doc.path {
            write_json_atomic(&self.recent_path(), &RecentDocument { path: path.clone() })?;
        }
        Ok(())
    }

    fn last_document(&self) -> Result<Option<PathBuf>> {
        Ok(read_json::<RecentDocument>(&self.recent_path())?.map(|recent| recent.path))
    }
}

#[derive(Default)]
pub struct MemoryProgressStore {
    inner: Mutex<HashMap<DocumentId, ReadingProgress>>,
    recent: Mutex<Option<PathBuf>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<ReadingProgress>> {
        Ok(self.inner.lock().get(&doc.id).cloned())
    }

    fn save(&self, doc: &DocumentInfo, progress: &ReadingProgress) -> Result<()> {
        self.inner.lock().insert(doc.id, progress.clone());
        if let Some(path) = &doc.path {
            *self.recent.lock() = Some(path.clone());
        }
        Ok(())
    }

    fn last_document(&self) -> Result<Option<PathBuf>> {
        Ok(self.recent.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document_id_for_path;
    use tempfile::tempdir;

    fn info_for(path: &Path) -> DocumentInfo {
        DocumentInfo {
            id: document_id_for_path(path),
            path: Some(path.to_path_buf()),
            encoding: "UTF-8".to_string(),
        }
    }

    #[test]
    fn file_store_restores_progress_with_stable_id() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("novel.txt");
        std::fs::write(&file_path, "text").unwrap();
        let store = FileProgressStore::new(dir.path().join("state")).unwrap();

        assert!(store.load(&info_for(&file_path)).unwrap().is_none());
        assert!(store.last_document().unwrap().is_none());

        let progress = ReadingProgress::at(150, 600);
        store.save(&info_for(&file_path), &progress).unwrap();

        let restored = store.load(&info_for(&file_path)).unwrap().unwrap();
        assert_eq!(restored.offset, 150);
        assert_eq!(restored.percent, 25.0);
        assert_eq!(store.last_document().unwrap(), Some(file_path));
        assert!(!dir.path().join("state").join("recent.json.tmp").exists());
    }

    #[test]
    fn file_store_reports_corrupt_state() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("novel.txt");
        let store = FileProgressStore::new(dir.path().to_path_buf()).unwrap();
        let info = info_for(&file_path);
        std::fs::write(dir.path().join(format!("{}.json", info.id)), "{ nope").unwrap();
        assert!(store.load(&info).is_err());
    }

    #[test]
    fn memory_store_tracks_recent_document() {
        let store = MemoryProgressStore::new();
        let info = info_for(Path::new("/tmp/hushread-memory.txt"));
        store.save(&info, &ReadingProgress::at(3, 10)).unwrap();
        assert_eq!(store.load(&info).unwrap().unwrap().offset, 3);
        assert_eq!(
            store.last_document().unwrap(),
            Some(PathBuf::from("/tmp/hushread-memory.txt"))
        );
    }
}
