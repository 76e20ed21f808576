//! redb-backed storage for analysis results and notes.
//!
//! [redb](https://docs.rs/redb) is a pure Rust, ACID embedded database. One
//! table maps string keys to encoded record bytes; results and notes share it
//! and are told apart by key prefix.
//!
//! # Features
//!
//! - **Durable writes**: every `put` and `delete` commits its own write
//!   transaction, so a returned `Ok` means the record is on disk
//! - **Concurrent reads**: readers use MVCC snapshots and never block writers
//! - **Ordered keys**: `scan_prefix` walks a key range instead of the whole
//!   table, so listing notes does not touch stored results
//! - **Single owner**: redb locks the file, so open one `RedbBackend` per path
//!   and share it behind an `Arc`
//!
//! # Example
//!
//! ```no_run
//! use store::{RedbBackend, StorageBackend};
//!
//! let backend = RedbBackend::open("/var/lib/markcheck/results.redb")?;
//! backend.put("note/0000000000000001", b"encoded note")?;
//! assert!(backend.get("note/0000000000000001")?.is_some());
//! # Ok::<(), store::StoreError>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use super::StorageBackend;
use crate::StoreError;

const RESULTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("analysis_results");

/// Storage backend over a single redb database file.
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create the database file and make sure the results table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::backend)?;

        let txn = db.begin_write().map_err(StoreError::backend)?;
        txn.open_table(RESULTS_TABLE).map_err(StoreError::backend)?;
        txn.commit().map_err(StoreError::backend)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl StorageBackend for RedbBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = txn.open_table(RESULTS_TABLE).map_err(StoreError::backend)?;
            table.insert(key, value).map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(RESULTS_TABLE).map_err(StoreError::backend)?;
        let value = table.get(key).map_err(StoreError::backend)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = txn.open_table(RESULTS_TABLE).map_err(StoreError::backend)?;
            table.remove(key).map_err(StoreError::backend)?;
        }
        txn.commit().map_err(StoreError::backend)
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin_read().map_err(StoreError::backend)?;
        let table = txn.open_table(RESULTS_TABLE).map_err(StoreError::backend)?;

        // Keys are ordered, so matches are contiguous from `prefix` onwards.
        for item in table.range(prefix..).map_err(StoreError::backend)? {
            let (key, value) = item.map_err(StoreError::backend)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            visitor(key.value(), value.value())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn put_get_delete() {
        let file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(file.path()).unwrap();

        backend.put("k", b"value").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"value".to_vec()));
        assert_eq!(backend.get("missing").unwrap(), None);

        backend.delete("k").unwrap();
        assert_eq!(backend.get("k").unwrap(), None);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.put("k", b"persisted").unwrap();
        }
        let reopened = RedbBackend::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap(), Some(b"persisted".to_vec()));
    }

    #[test]
    fn scan_prefix_stops_at_range_end() {
        let file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(file.path()).unwrap();

        backend.put("note/0000000000000002", b"two").unwrap();
        backend.put("note/0000000000000001", b"one").unwrap();
        backend.put("ffee", b"result").unwrap();
        backend.put("abcd", b"result").unwrap();

        let mut seen = Vec::new();
        backend
            .scan_prefix("note/", &mut |key, value| {
                seen.push((key.to_string(), value.to_vec()));
                Ok(())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                ("note/0000000000000001".to_string(), b"one".to_vec()),
                ("note/0000000000000002".to_string(), b"two".to_vec()),
            ]
        );
    }
}
