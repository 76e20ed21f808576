//! Grammar and style checks over normalized plain text.
//!
//! The crate has three layers:
//!
//! - [`Rule`]: a single check, given plain text and a [`RuleContext`]
//! - [`RuleKind`]: the registry of built-in rules
//! - [`RuleEngine`]: runs the enabled rules concurrently, isolating failures
//!   and enforcing a per-rule timeout, then merges their findings
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rules::{RuleConfig, RuleEngine, RuleOptions};
//!
//! # async fn demo() {
//! let engine = RuleEngine::builtin(RuleOptions::default(), Duration::from_secs(2));
//! let report = engine
//!     .run(Arc::from("Thiss is a test."), "en", &RuleConfig::default())
//!     .await;
//! assert_eq!(report.findings[0].rule_id, "spelling");
//! # }
//! ```

mod builtin;
mod config;
mod engine;
mod finding;
mod registry;
mod rule;

pub use builtin::{
    ArticleAgreement, PunctuationSpacing, RepeatedWord, SentenceCase, SentenceLength, Spelling,
    Whitespace,
};
pub use config::{RuleConfig, RuleSettings};
pub use engine::{EngineError, EngineReport, RuleEngine, RuleFailure, DEFAULT_RULE_TIMEOUT};
pub use finding::{Finding, RuleMatch, Severity};
pub use registry::{RuleKind, RuleOptions, DEFAULT_MAX_SENTENCE_WORDS};
pub use rule::{Rule, RuleContext, RuleError};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn builtin_engine_flags_sample_document() {
        let engine = RuleEngine::builtin(RuleOptions::default(), DEFAULT_RULE_TIMEOUT);
        let text: Arc<str> = Arc::from("Hello\n\nThiss is a test.");
        let report = engine.run(text, "en", &RuleConfig::default()).await;

        assert_eq!(report.attempted, RuleKind::ALL.len());
        assert!(report.failures.is_empty());
        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.rule_id, "spelling");
        assert_eq!((finding.start, finding.length), (7, 5));
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.suggestion.as_deref(), Some("This"));
    }

    #[tokio::test]
    async fn clean_text_has_no_findings() {
        let engine = RuleEngine::builtin(RuleOptions::default(), DEFAULT_RULE_TIMEOUT);
        let report = engine
            .run(Arc::from("This is a clean sentence."), "en", &RuleConfig::default())
            .await;
        assert!(report.findings.is_empty());
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let engine = RuleEngine::builtin(RuleOptions::default(), DEFAULT_RULE_TIMEOUT);
        let text: Arc<str> = Arc::from("the the cat sat on a apple , then  left. teh end");
        let first = engine.run(text.clone(), "en", &RuleConfig::default()).await;
        let second = engine.run(text, "en", &RuleConfig::default()).await;
        assert_eq!(first, second);
        assert!(first.findings.len() >= 5);
    }
}
