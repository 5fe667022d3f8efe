use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A string-keyed slot store, the shape of browser local storage.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Process-local storage with an optional byte quota shared by all slots.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.slots.write();
        if let Some(quota) = self.quota_bytes {
            let others: usize = slots
                .iter()
                .filter(|(slot, _)| slot.as_str() != key)
                .map(|(slot, stored)| slot.len() + stored.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(others);
            if needed > available {
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per slot under a root directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::Unavailable(format!(
                "invalid storage key `{key}`"
            )));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        fs::create_dir_all(&self.root)?;
        // Slots are replaced whole, never partially written.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        tracing::debug!(path = %path.display(), bytes = value.len(), "slot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_round_trips_values() {
        let storage = MemoryStorage::new();
        assert!(storage.get_item("checkin-items").unwrap().is_none());
        storage.set_item("checkin-items", "[]").unwrap();
        storage.set_item("checkin-items", "[1]").unwrap();
        assert_eq!(storage.get_item("checkin-items").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn memory_quota_counts_other_slots_only() {
        let storage = MemoryStorage::with_quota(20);
        storage.set_item("a", "123456789").unwrap();
        // Overwriting the same slot frees its previous bytes.
        storage.set_item("a", "987654321").unwrap();
        let err = storage.set_item("b", "0123456789").unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded { needed: 11, available: 10 }
        ));
        assert!(storage.get_item("b").unwrap().is_none());
    }

    #[test]
    fn file_storage_rejects_path_like_keys() {
        let storage = FileStorage::new("/nonexistent");
        assert!(matches!(
            storage.get_item("../etc/passwd"),
            Err(StorageError::Unavailable(_))
        ));
    }
}
