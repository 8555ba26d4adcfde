//! Local key-value persistence
//!
//! The registry only needs two string-valued keys, so the storage seam is a
//! plain `get`/`set` contract. `MemoryStore` backs tests; `FileStore` keeps
//! every key in one JSON document on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Synchronous string key-value store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in a single JSON object file, rewritten on every `set`
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "store.json";

    /// Open `<dir>/store.json`. A missing or unreadable file yields an empty store.
    pub fn open_in(dir: &Path) -> Self {
        Self::open(dir.join(Self::FILE_NAME))
    }

    pub fn open(path: PathBuf) -> Self {
        let entries: BTreeMap<String, String> = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "store file is corrupt, starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store file unreadable, starting empty");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "opened store");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let write_err = |source: std::io::Error| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }

        let body = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value);
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("a"), None);
        store.set("a", "1".into()).unwrap();
        store.set("a", "2".into()).unwrap();
        assert_eq!(store.get("a"), Some("2".to_string()));
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data");

        let mut store = FileStore::open_in(&nested);
        assert_eq!(store.get("k"), None);
        store.set("k", "[1,2]".into()).unwrap();

        let reopened = FileStore::open_in(&nested);
        assert_eq!(reopened.get("k"), Some("[1,2]".to_string()));
        assert!(!nested.join("store.json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FileStore::FILE_NAME), "{not json").unwrap();

        let mut store = FileStore::open_in(dir.path());
        assert_eq!(store.get("k"), None);

        // Writing replaces the corrupt document
        store.set("k", "v".into()).unwrap();
        let reopened = FileStore::open_in(dir.path());
        assert_eq!(reopened.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_file_store_failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        // Parent is a regular file, so the directory can never be created
        let mut store = FileStore::open_in(&blocker.join("data"));
        assert!(store.set("k", "v".into()).is_err());
        assert_eq!(store.get("k"), None);

        let mut store = FileStore::open_in(dir.path());
        store.set("k", "old".into()).unwrap();
        std::fs::create_dir(dir.path().join("store.json.tmp")).unwrap();
        assert!(store.set("k", "new".into()).is_err());
        assert_eq!(store.get("k"), Some("old".to_string()));
    }
}
