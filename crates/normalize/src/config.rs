//! Configuration types for Markdown normalization.
//!
//! [`NormalizeConfig`] controls the limits and recovery policy applied while a
//! Markdown document is flattened into plain text.
//!
//! # Versioning
//!
//! The `version` field takes part in the fingerprint. Any change to how plain
//! text is produced (even a bug fix in separator handling) must come with a
//! version bump, otherwise cached and persisted results computed by the old
//! behavior would be served for the new one.
//!
//! # Examples
//!
//! ```rust
//! use normalize::NormalizeConfig;
//!
//! let config = NormalizeConfig::default();
//! assert_eq!(config.version, 1);
//! assert!(config.recover_malformed);
//! assert_eq!(config.default_language, "en");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;

/// Default upper bound on raw document size (1 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Configuration for the normalization stage.
///
/// ```json
/// {
///   "version": 1,
///   "max_document_bytes": 1048576,
///   "recover_malformed": true,
///   "default_language": "en"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Behavior version. Must be >= 1; version 0 is reserved and rejected.
    pub version: u32,

    /// Raw documents larger than this many bytes are rejected with
    /// [`NormalizeError::DocumentTooLarge`].
    pub max_document_bytes: usize,

    /// When true, structurally invalid Markdown (an unterminated code fence)
    /// is recovered by treating the remainder as plain text and attaching a
    /// diagnostic. When false the document is rejected with
    /// [`NormalizeError::Malformed`].
    pub recover_malformed: bool,

    /// Language used when a document arrives with an empty language tag.
    pub default_language: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            recover_malformed: true,
            default_language: "en".to_string(),
        }
    }
}

impl NormalizeConfig {
    /// Check the configuration before it is used.
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.version == 0 {
            return Err(NormalizeError::InvalidConfig(
                "config version must be >= 1".into(),
            ));
        }
        if self.max_document_bytes == 0 {
            return Err(NormalizeError::InvalidConfig(
                "max_document_bytes must be >= 1".into(),
            ));
        }
        if !crate::document::is_valid_language_tag(&self.default_language) {
            return Err(NormalizeError::InvalidConfig(format!(
                "default_language `{}` is not a valid language tag",
                self.default_language
            )));
        }
        Ok(())
    }
}
