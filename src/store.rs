//! Key-value persistence for the vault
//!
//! The vault only ever touches one key, but the store is a plain string map
//! so it can stand in for any local storage facility. `FileStore` keeps the
//! map in a single JSON file guarded by an advisory lock; `MemoryStore` is
//! the in-process equivalent used by tests and embedders.

use crate::config::{ensure_private_dir, write_atomic};
use crate::error::{Error, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const STORE_FILE: &str = "storage.json";
#[cfg(not(test))]
const STORE_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
#[cfg(test)]
const STORE_LOCK_TIMEOUT: Duration = Duration::from_millis(200);
const STORE_LOCK_RETRY_MS: u64 = 50;

/// Local key-value storage facility.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// JSON-file backed store, one file per directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

struct StoreLock {
    file: fs::File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store living next to the config file.
    pub fn default_location() -> Result<Self> {
        crate::config::Config::config_dir()
            .map(Self::new)
            .ok_or_else(|| Error::Storage("could not determine config directory".to_string()))
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE)
    }

    fn lock(&self) -> Result<StoreLock> {
        ensure_private_dir(&self.dir).map_err(Error::Storage)?;

        let lock_path = self.dir.join(".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(Error::storage)?;

        let start = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(err) => {
                    if err.kind() != ErrorKind::WouldBlock {
                        return Err(Error::storage(err));
                    }
                    if start.elapsed() >= STORE_LOCK_TIMEOUT {
                        return Err(Error::Storage(format!(
                            "timed out waiting for store lock ({:?})",
                            STORE_LOCK_TIMEOUT
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(STORE_LOCK_RETRY_MS));
                }
            }
        }

        Ok(StoreLock { file })
    }

    fn read_map(path: &Path) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Error::Storage(format!("{} is corrupted: {}", path.display(), e))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(Error::storage(err)),
        }
    }

    fn write_map(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(map).map_err(Error::storage)?;
        write_atomic(path, &content).map_err(Error::Storage)
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _lock = self.lock()?;
        let path = self.path();
        let mut map = Self::read_map(&path)?;
        apply(&mut map);
        Self::write_map(&path, &map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let _lock = self.lock()?;
        Ok(Self::read_map(&path)?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path().exists() {
            return Ok(());
        }
        self.update(|map| {
            map.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path()).set("k", "value").unwrap();

        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_file_store_remove_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("a").unwrap();

        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("never-created"));
        assert_eq!(store.get("k").unwrap(), None);
        store.remove("k").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        fs::write(store.path(), "[1, 2").unwrap();
        assert!(matches!(store.get("k"), Err(Error::Storage(_))));
    }

    #[test]
    fn test_file_store_times_out_while_locked_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("k", "v").unwrap();

        let holder = OpenOptions::new()
            .read(true)
            .write(true)
            .open(dir.path().join(".lock"))
            .unwrap();
        FileExt::lock_exclusive(&holder).unwrap();

        match store.set("k", "other") {
            Err(Error::Storage(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected lock timeout, got {:?}", other),
        }
        assert!(matches!(store.get("k"), Err(Error::Storage(_))));

        FileExt::unlock(&holder).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
