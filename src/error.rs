use normalize::{MalformedInput, NormalizeError};
use rules::{EngineError, RuleFailure};
use serde::{Deserialize, Serialize};
use store::StoreError;
use thiserror::Error;

/// Request-level failures. Each maps to a stable code via [`AnalysisError::code`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("malformed markdown: {0}")]
    MalformedInput(MalformedInput),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid rule configuration: {0}")]
    InvalidRuleConfig(#[from] EngineError),

    #[error("all {attempted} enabled rules failed")]
    RulesUnavailable {
        attempted: usize,
        failures: Vec<RuleFailure>,
    },

    #[error("analysis timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::MalformedInput(_) => "MALFORMED_INPUT",
            AnalysisError::InvalidDocument(_) => "INVALID_DOCUMENT",
            AnalysisError::InvalidRuleConfig(_) => "INVALID_RULE_CONFIG",
            AnalysisError::RulesUnavailable { .. } => "RULES_UNAVAILABLE",
            AnalysisError::Timeout { .. } => "ANALYSIS_TIMEOUT",
            AnalysisError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<NormalizeError> for AnalysisError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Malformed(input) => AnalysisError::MalformedInput(input),
            NormalizeError::InvalidConfig(msg) => {
                AnalysisError::Internal(format!("normalizer misconfigured: {msg}"))
            }
            other @ (NormalizeError::EmptyDocument
            | NormalizeError::DocumentTooLarge { .. }
            | NormalizeError::InvalidLanguageTag(_)) => {
                AnalysisError::InvalidDocument(other.to_string())
            }
        }
    }
}

/// Failures of note operations on a [`Notebook`](crate::Notebook).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NoteError {
    #[error("invalid note: {0}")]
    InvalidNote(String),

    #[error("note {0} not found")]
    NotFound(u64),

    #[error("note storage failed: {0}")]
    Storage(StoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl NoteError {
    pub fn code(&self) -> &'static str {
        match self {
            NoteError::InvalidNote(_) => "INVALID_NOTE",
            NoteError::NotFound(_) => "NOTE_NOT_FOUND",
            NoteError::Storage(_) => "STORAGE_FAILURE",
            NoteError::Analysis(err) => err.code(),
            NoteError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for NoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidNote(msg) => NoteError::InvalidNote(msg),
            other => NoteError::Storage(other),
        }
    }
}

/// Problems that degraded a request without failing it.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    #[error("recovered from malformed markdown at line {line}: {reason}")]
    MalformedInput {
        line: usize,
        offset: usize,
        reason: String,
    },

    #[error("rule `{rule_id}` timed out after {timeout_ms} ms")]
    RuleTimeout { rule_id: String, timeout_ms: u64 },

    #[error("rule `{rule_id}` failed: {message}")]
    RuleFault { rule_id: String, message: String },

    #[error("result storage unavailable: {message}")]
    StorageUnavailable { message: String },
}

impl From<RuleFailure> for AnalysisWarning {
    fn from(failure: RuleFailure) -> Self {
        match failure {
            RuleFailure::Timeout {
                rule_id,
                timeout_ms,
            } => AnalysisWarning::RuleTimeout {
                rule_id,
                timeout_ms,
            },
            RuleFailure::Fault { rule_id, message } => {
                AnalysisWarning::RuleFault { rule_id, message }
            }
        }
    }
}

impl From<MalformedInput> for AnalysisWarning {
    fn from(input: MalformedInput) -> Self {
        AnalysisWarning::MalformedInput {
            line: input.line,
            offset: input.offset,
            reason: input.reason,
        }
    }
}
