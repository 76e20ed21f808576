//! Result caching and persistence for markcheck.
//!
//! Two layers sit behind the analysis coordinator:
//!
//! - [`ResultCache`]: a sharded, bounded, TTL-aware LRU held in memory
//! - [`ResultStore`]: durable storage over a pluggable [`StorageBackend`]
//!   (in-memory or redb), with bincode encoding and zstd compression
//!
//! A [`NoteRepository`] keeps titled Markdown notes in the same backend.
//!
//! The cache and store are keyed by the [`Fingerprint`] of the normalized text and rule
//! profile, and both hold immutable [`AnalysisResult`] values.
//!
//! ```
//! use std::sync::Arc;
//! use normalize::Fingerprint;
//! use store::{AnalysisResult, CacheConfig, ResultCache, ResultStore, StoreConfig};
//!
//! let fp = Fingerprint::compute(1, "en", "hello", b"");
//! let result = Arc::new(AnalysisResult::new(fp, Vec::new()));
//!
//! let cache = ResultCache::new(CacheConfig::default()).unwrap();
//! cache.put(fp, Arc::clone(&result));
//! assert!(cache.get(&fp).is_some());
//!
//! let store = ResultStore::new(&StoreConfig::InMemory).unwrap();
//! store.put(&result).unwrap();
//! assert_eq!(store.get(&fp).unwrap().as_ref(), Some(result.as_ref()));
//! ```

mod backend;
mod cache;
mod notes;
mod store;

pub use backend::{InMemoryBackend, StorageBackend, StoreConfig};
#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use cache::{CacheConfig, CacheStats, ResultCache};
pub use notes::{
    DEFAULT_NOTE_CACHE_CAPACITY, DEFAULT_NOTE_CACHE_TTL, NOTE_SCHEMA_VERSION, NewNote, Note,
    NoteRepository,
};
pub use store::ResultStore;

use bincode::error::{DecodeError, EncodeError};
use chrono::{DateTime, Utc};
use normalize::Fingerprint;
use rules::Finding;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bump whenever the persisted `AnalysisResult` layout changes.
pub const RESULT_SCHEMA_VERSION: u16 = 1;

/// Completed analysis for one fingerprint.
///
/// Findings are in plain-text coordinates, so the same result can be mapped
/// onto any source document that normalizes to the same text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub schema_version: u16,
    pub fingerprint: Fingerprint,
    pub findings: Vec<Finding>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(fingerprint: Fingerprint, findings: Vec<Finding>) -> Self {
        Self {
            schema_version: RESULT_SCHEMA_VERSION,
            fingerprint,
            findings,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("invalid note: {0}")]
    InvalidNote(String),
    #[error("stored schema version {found} does not match expected {expected}")]
    SchemaMismatch { found: u16, expected: u16 },
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<EncodeError> for StoreError {
    fn from(e: EncodeError) -> Self {
        StoreError::Encode(e.to_string())
    }
}

impl From<DecodeError> for StoreError {
    fn from(e: DecodeError) -> Self {
        StoreError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Compression(e.to_string())
    }
}
