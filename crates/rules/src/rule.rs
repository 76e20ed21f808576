use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::finding::{RuleMatch, Severity};

/// Errors a rule may return from [`Rule::check`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule deadline exceeded")]
    DeadlineExceeded,
    #[error("internal rule fault: {0}")]
    Internal(String),
}

/// A single grammar or style check.
///
/// Rules see only the plain text and their own context; they never observe
/// the output of other rules.
pub trait Rule: Send + Sync {
    /// Stable identifier, used in configuration and in findings.
    fn id(&self) -> &str;

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    /// Whether the rule applies to documents in `language`.
    fn supports(&self, _language: &str) -> bool {
        true
    }

    fn check(&self, text: &str, ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError>;
}

/// Per-invocation context handed to a rule.
///
/// Long-running rules call [`RuleContext::checkpoint`] periodically so they
/// stop promptly once the engine has given up on them.
#[derive(Debug, Clone)]
pub struct RuleContext {
    language: String,
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl RuleContext {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn checkpoint(&self) -> Result<(), RuleError> {
        if self.is_cancelled() {
            Err(RuleError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn checkpoint_passes_without_deadline() {
        assert!(RuleContext::new("en").checkpoint().is_ok());
    }

    #[test]
    fn checkpoint_fails_after_deadline() {
        let ctx = RuleContext::new("en").with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(ctx.checkpoint(), Err(RuleError::DeadlineExceeded));
    }

    #[test]
    fn checkpoint_fails_when_cancelled() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = RuleContext::new("en").with_cancel_flag(flag.clone());
        assert!(ctx.checkpoint().is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(ctx.checkpoint(), Err(RuleError::DeadlineExceeded));
    }
}
