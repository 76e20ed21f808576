//! Pluggable key-value storage.
//!
//! # Features
//!
//! - **[`InMemoryBackend`]**: a `RwLock<HashMap>` for tests and ephemeral runs
//! - **[`RedbBackend`]**: a redb database file, behind the default
//!   `backend-redb` feature
//! - **Prefix scans**: `scan_prefix` lists one key namespace, which is how
//!   notes are enumerated without touching results
//!
//! # Example
//!
//! ```
//! use store::{StorageBackend, StoreConfig};
//!
//! let backend = StoreConfig::InMemory.build()?;
//! backend.put("note/0000000000000001", b"a")?;
//! backend.put("c0ffee", b"b")?;
//!
//! let mut keys = Vec::new();
//! backend.scan_prefix("note/", &mut |key, _| {
//!     keys.push(key.to_string());
//!     Ok(())
//! })?;
//! assert_eq!(keys, ["note/0000000000000001"]);
//! # Ok::<(), store::StoreError>(())
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Byte-oriented key-value storage underneath [`ResultStore`](crate::ResultStore)
/// and [`NoteRepository`](crate::NoteRepository).
///
/// Both share one backend, so keys are namespaced: results use the bare
/// fingerprint hex, notes live under `note/`.
pub trait StorageBackend: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Visit every record whose key starts with `prefix`. Order is
    /// backend-defined.
    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Which storage backend to open.
///
/// ```
/// use store::StoreConfig;
///
/// let config: StoreConfig = serde_yaml::from_str("backend: in_memory").unwrap();
/// assert_eq!(config, StoreConfig::InMemory);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local map; contents are lost on exit.
    #[default]
    InMemory,
    /// redb database file. Requires the `backend-redb` feature.
    Redb { path: PathBuf },
}

impl StoreConfig {
    pub fn redb(path: impl Into<PathBuf>) -> Self {
        StoreConfig::Redb { path: path.into() }
    }

    pub fn build(&self) -> Result<Arc<dyn StorageBackend>, StoreError> {
        match self {
            StoreConfig::InMemory => Ok(Arc::new(InMemoryBackend::new())),
            StoreConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Arc::new(RedbBackend::open(path)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(StoreError::backend("redb backend disabled at compile time"))
                }
            }
        }
    }
}

/// `RwLock<HashMap>` backend for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for InMemoryBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .remove(key);
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let guard = self
            .records
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        for (key, value) in guard.iter().filter(|(key, _)| key.starts_with(prefix)) {
            visitor(key.as_str(), value.as_slice())?;
        }
        Ok(())
    }
}

#[cfg(feature = "backend-redb")]
mod redb;

#[cfg(feature = "backend-redb")]
pub use self::redb::RedbBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_put_get_delete() {
        let backend = InMemoryBackend::new();
        backend.put("a", b"one").unwrap();
        assert_eq!(backend.get("a").unwrap(), Some(b"one".to_vec()));
        assert_eq!(backend.get("b").unwrap(), None);
        backend.delete("a").unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn in_memory_scan_prefix_filters_keys() {
        let backend = InMemoryBackend::new();
        backend.put("note/1", b"one").unwrap();
        backend.put("note/2", b"two").unwrap();
        backend.put("abcdef", b"result").unwrap();

        let mut keys = Vec::new();
        backend
            .scan_prefix("note/", &mut |key, _| {
                keys.push(key.to_string());
                Ok(())
            })
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec!["note/1", "note/2"]);
    }

    #[test]
    fn config_parses_redb_variant() {
        let config: StoreConfig =
            serde_yaml::from_str("backend: redb\npath: /tmp/results.redb").unwrap();
        assert_eq!(config, StoreConfig::redb("/tmp/results.redb"));
    }
}
