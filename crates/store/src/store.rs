//! Durable, versioned result records.
//!
//! # Features
//!
//! - **Pluggable backend**: any [`StorageBackend`]; [`StoreConfig`] opens the
//!   in-memory map or a redb file
//! - **Compact records**: bincode encoding compressed with zstd
//! - **Versioned layout**: a big-endian `u16` schema version precedes every
//!   record and is checked before decoding
//! - **Shared backend**: the backend sits behind an `Arc` so a
//!   [`NoteRepository`](crate::NoteRepository) can use the same database file
//!
//! # Example
//!
//! ```
//! use normalize::Fingerprint;
//! use store::{AnalysisResult, ResultStore, StoreConfig};
//!
//! let store = ResultStore::new(&StoreConfig::InMemory)?;
//! let result = AnalysisResult::new(Fingerprint::compute(1, "en", "text", b""), Vec::new());
//! store.put(&result)?;
//! assert_eq!(store.get(&result.fingerprint)?, Some(result));
//! # Ok::<(), store::StoreError>(())
//! ```

use std::sync::Arc;

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use normalize::Fingerprint;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use zstd::{decode_all, encode_all};

use crate::backend::{StorageBackend, StoreConfig};
use crate::{AnalysisResult, RESULT_SCHEMA_VERSION, StoreError};

pub(crate) const DEFAULT_COMPRESSION_LEVEL: i32 = 3;
const VERSION_PREFIX_LEN: usize = 2;

/// Durable storage of analysis results keyed by fingerprint.
///
/// Records are laid out as a big-endian `u16` schema version followed by the
/// zstd-compressed bincode encoding of [`AnalysisResult`]. The version prefix
/// is checked before decoding so a layout change surfaces as
/// [`StoreError::SchemaMismatch`] instead of a garbled decode.
pub struct ResultStore {
    backend: Arc<dyn StorageBackend>,
    compression_level: i32,
}

impl std::fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStore")
            .field("compression_level", &self.compression_level)
            .finish_non_exhaustive()
    }
}

impl ResultStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::with_backend(config.build()?))
    }

    /// Wrap an existing backend, e.g. a test double or one shared with notes.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// The backend this store writes to.
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.backend)
    }

    pub fn put(&self, result: &AnalysisResult) -> Result<(), StoreError> {
        let payload = encode_record(result, RESULT_SCHEMA_VERSION, self.compression_level)?;
        self.backend.put(&result.fingerprint.to_hex(), &payload)?;
        debug!(
            fingerprint = %result.fingerprint,
            bytes = payload.len(),
            "result_persisted"
        );
        Ok(())
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<AnalysisResult>, StoreError> {
        match self.backend.get(&fingerprint.to_hex())? {
            Some(bytes) => decode_record(&bytes, RESULT_SCHEMA_VERSION).map(Some),
            None => Ok(None),
        }
    }

    pub fn delete(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.backend.delete(&fingerprint.to_hex())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.backend.flush()
    }
}

/// Version prefix, then zstd(bincode(value)).
pub(crate) fn encode_record<T: Serialize>(
    value: &T,
    version: u16,
    compression_level: i32,
) -> Result<Vec<u8>, StoreError> {
    let encoded = encode_to_vec(value, standard())?;
    let compressed = encode_all(encoded.as_slice(), compression_level)?;
    let mut payload = Vec::with_capacity(VERSION_PREFIX_LEN + compressed.len());
    payload.extend_from_slice(&version.to_be_bytes());
    payload.extend_from_slice(&compressed);
    Ok(payload)
}

pub(crate) fn decode_record<T: DeserializeOwned>(
    bytes: &[u8],
    expected: u16,
) -> Result<T, StoreError> {
    if bytes.len() < VERSION_PREFIX_LEN {
        return Err(StoreError::Decode("record shorter than version prefix".into()));
    }
    let (prefix, body) = bytes.split_at(VERSION_PREFIX_LEN);
    let found = u16::from_be_bytes([prefix[0], prefix[1]]);
    if found != expected {
        return Err(StoreError::SchemaMismatch { found, expected });
    }
    let decompressed = decode_all(body)?;
    let (value, _): (T, usize) = decode_from_slice(&decompressed, standard())?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;
    use rules::{Finding, Severity};

    fn sample() -> AnalysisResult {
        let fp = Fingerprint::compute(1, "en", "Thiss is a test.", b"profile");
        AnalysisResult::new(
            fp,
            vec![Finding {
                rule_id: "spelling".into(),
                severity: Severity::Error,
                start: 0,
                length: 5,
                message: "Possible spelling mistake".into(),
                suggestion: Some("This".into()),
            }],
        )
    }

    #[test]
    fn stores_and_restores_results() {
        let store = ResultStore::new(&StoreConfig::InMemory).unwrap();
        let result = sample();
        store.put(&result).unwrap();

        assert_eq!(store.get(&result.fingerprint).unwrap(), Some(result.clone()));
        store.delete(&result.fingerprint).unwrap();
        assert_eq!(store.get(&result.fingerprint).unwrap(), None);
    }

    #[test]
    fn schema_mismatch_detected() {
        let raw = Arc::new(InMemoryBackend::new());
        let store = ResultStore::with_backend(raw.clone());
        let result = sample();
        store.put(&result).unwrap();

        let key = result.fingerprint.to_hex();
        let mut bytes = raw.get(&key).unwrap().unwrap();
        bytes[..2].copy_from_slice(&99u16.to_be_bytes());
        raw.put(&key, &bytes).unwrap();

        assert_eq!(
            store.get(&result.fingerprint),
            Err(StoreError::SchemaMismatch {
                found: 99,
                expected: RESULT_SCHEMA_VERSION
            })
        );
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        let raw = Arc::new(InMemoryBackend::new());
        let store = ResultStore::with_backend(raw.clone());
        let fp = sample().fingerprint;
        let mut bytes = RESULT_SCHEMA_VERSION.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"not zstd");
        raw.put(&fp.to_hex(), &bytes).unwrap();

        assert!(matches!(store.get(&fp), Err(StoreError::Compression(_))));
        raw.put(&fp.to_hex(), &[1]).unwrap();
        assert!(matches!(store.get(&fp), Err(StoreError::Decode(_))));
    }

    #[cfg(feature = "backend-redb")]
    #[test]
    fn redb_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(&StoreConfig::redb(dir.path().join("r.redb"))).unwrap();
        let result = sample();
        store.put(&result).unwrap();
        assert_eq!(store.get(&result.fingerprint).unwrap(), Some(result));
    }
}
