//! Scalar key-value persistence for the signed-in session and UI preferences.
//!
//! Only [`crate::auth::session::SessionManager`] talks to a store; everything
//! else goes through it.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A flat map of scalar values.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

pub fn default_state_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/skeetboy/state.json")
}

/// JSON object on disk, rewritten after every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// An unreadable or corrupt file starts out empty rather than failing;
    /// the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = if path.exists() {
            let json = fs::read_to_string(&path)?;
            match serde_json::from_str(&json) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "ignoring corrupt state file: {e}");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(default_state_path())
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let previous = self.values.insert(key.to_owned(), value);
        if let Err(e) = self.flush() {
            match previous {
                Some(old) => self.values.insert(key.to_owned(), old),
                None => self.values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store, used when the state file cannot be opened and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set("handle", Value::from("alice.bsky.social")).unwrap();
        store.set("isSoundEnabled", Value::Bool(false)).unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_string("handle").as_deref(),
            Some("alice.bsky.social")
        );
        assert_eq!(reopened.get_bool("isSoundEnabled"), Some(false));
    }

    #[test]
    fn file_store_remove_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = FileStore::open(&path).unwrap();
        store.set("accessJwt", Value::from("tok")).unwrap();
        store.remove("accessJwt").unwrap();
        store.remove("accessJwt").unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.get("accessJwt").is_none());
    }

    #[test]
    fn failed_write_is_not_visible() {
        let dir = tempfile::tempdir().unwrap();
        // The parent is a regular file, so every flush fails.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut store = FileStore::open(blocker.join("state.json")).unwrap();
        assert!(store.set("accessJwt", Value::from("tok")).is_err());
        assert!(store.get("accessJwt").is_none());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("handle").is_none());
    }

    #[test]
    fn typed_getters_reject_mismatched_values() {
        let store = MemoryStore::new()
            .with("handle", true)
            .with("isCRTModeEnabled", "yes");
        assert_eq!(store.get_string("handle"), None);
        assert_eq!(store.get_bool("isCRTModeEnabled"), None);
    }
}
