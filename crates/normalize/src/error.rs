use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural problem found in the Markdown source.
///
/// Produced as a diagnostic when recovery is enabled, or wrapped in
/// [`NormalizeError::Malformed`] when it is not.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("malformed markdown at line {line}: {reason}")]
pub struct MalformedInput {
    /// 1-based line of the offending construct.
    pub line: usize,
    /// Byte offset of the offending construct in the source.
    pub offset: usize,
    pub reason: String,
}

/// Errors that can occur during normalization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("document is empty")]
    EmptyDocument,
    #[error("document size {len} exceeds limit of {limit} bytes")]
    DocumentTooLarge { len: usize, limit: usize },
    #[error("invalid language tag `{0}`")]
    InvalidLanguageTag(String),
    #[error(transparent)]
    Malformed(#[from] MalformedInput),
}
