use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    #[error("unable to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("unable to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("unable to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

/// String slots addressed by a fixed key, the local-storage model the
/// alarm store persists through.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        if !self.root.as_os_str().is_empty() {
            fs::create_dir_all(&self.root).map_err(|source| StorageError::Write {
                path: self.root.clone(),
                source,
            })?;
        }
        write_replacing(&path, value).map_err(|source| StorageError::Write { path, source })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove { path, source }),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    slots: HashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(key: &str, value: &str) -> Self {
        let mut slots = HashMap::new();
        slots.insert(key.to_string(), value.to_string());
        Self { slots }
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.slots.remove(key);
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

// Readers see either the previous payload or the new one, never a torn write.
fn write_replacing(path: &Path, value: &str) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value)?;
    fs::rename(&tmp, path)
}


#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn file_store_round_trips_and_removes_slot() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileKeyValueStore::new(dir.path());

        assert_eq!(store.get("alarms").expect("read"), None);
        store.set("alarms", "[]").expect("write");
        assert_eq!(store.get("alarms").expect("read").as_deref(), Some("[]"));
        assert!(dir.path().join("alarms.json").exists());
        assert!(!dir.path().join("alarms.json.tmp").exists());

        store.remove("alarms").expect("remove");
        assert_eq!(store.get("alarms").expect("read"), None);
        store.remove("alarms").expect("removing an absent slot is fine");
    }

    #[test]
    fn file_store_creates_missing_data_dir() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("state").join("clock");
        let mut store = FileKeyValueStore::new(&nested);
        store.set("alarms", "[]").expect("write");
        assert!(nested.join("alarms.json").exists());
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = tempdir().expect("tempdir");
        let store = FileKeyValueStore::new(dir.path());
        let err = store.get("../escape").expect_err("traversal key should fail");
        assert!(matches!(err, StorageError::InvalidKey(_)));

        let mut memory = MemoryKeyValueStore::new();
        assert!(memory.set("", "x").is_err());
    }
}
