//! Markdown grammar and style analysis.
//!
//! A request flows through the [`Coordinator`]:
//!
//! 1. the Markdown is normalized to plain text with a position map
//! 2. the text and effective rule profile are fingerprinted
//! 3. the fingerprint is looked up in the [`ResultCache`], then in the
//!    [`ResultStore`]
//! 4. on a miss the [`RuleEngine`] runs every enabled rule concurrently
//! 5. findings are mapped back onto the source as line, column and byte span
//!
//! A [`Notebook`] stores titled Markdown notes next to the results and runs
//! the same pipeline, or renders HTML, by note id.
//!
//! ```no_run
//! use markcheck::{AnalysisRequest, MarkcheckConfig};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let coordinator = MarkcheckConfig::default().build_coordinator()?;
//! let outcome = coordinator
//!     .analyze(AnalysisRequest::new("# Hello\n\nThiss is a test.", "en"))
//!     .await?;
//! for finding in &outcome.findings {
//!     println!("{}", finding.describe());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod logging;
mod metrics;
mod notebook;
mod request;

pub use config::{
    CacheYamlConfig, ConfigLoadError, CoordinatorYamlConfig, LogFormat, LoggingConfig,
    MarkcheckConfig, NotesYamlConfig, RulesYamlConfig,
};
pub use coordinator::{
    AnalysisOutcome, Coordinator, CoordinatorConfig, MappedFinding, ResultSource, Stage,
    DEFAULT_HTML_CACHE_CAPACITY, DEFAULT_HTML_CACHE_TTL, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{AnalysisError, AnalysisWarning, NoteError};
pub use logging::init_tracing;
pub use metrics::AnalysisMetrics;
pub use notebook::Notebook;
pub use request::{AnalysisRequest, AnalysisResponse, ErrorDescriptor, ErrorResponse};

pub use normalize::{
    Document, Fingerprint, LineIndex, MalformedInput, NormalizeConfig, NormalizeError,
    NormalizedText, SourceSpan,
};
pub use rules::{
    EngineError, EngineReport, Finding, Rule, RuleConfig, RuleContext, RuleEngine, RuleError,
    RuleFailure, RuleKind, RuleMatch, RuleOptions, RuleSettings, Severity,
};
pub use store::{
    AnalysisResult, CacheConfig, CacheStats, InMemoryBackend, NewNote, Note, NoteRepository,
    ResultCache, ResultStore, StorageBackend, StoreConfig, StoreError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingMetrics {
        events: RwLock<Vec<&'static str>>,
    }

    impl CountingMetrics {
        fn snapshot(&self) -> Vec<&'static str> {
            self.events.read().unwrap().clone()
        }

        fn push(&self, label: &'static str) {
            self.events.write().unwrap().push(label);
        }
    }

    impl AnalysisMetrics for CountingMetrics {
        fn record_normalize(&self, _latency: Duration, result: Result<(), NormalizeError>) {
            self.push(if result.is_ok() { "normalize_ok" } else { "normalize_err" });
        }

        fn record_lookup(&self, _latency: Duration, source: Option<ResultSource>) {
            self.push(match source {
                Some(ResultSource::Cache) => "lookup_cache",
                Some(ResultSource::Storage) => "lookup_storage",
                Some(ResultSource::Analysis) => "lookup_analysis",
                None => "lookup_none",
            });
        }

        fn record_rules(&self, _latency: Duration, _attempted: usize, failed: usize) {
            self.push(if failed == 0 { "rules_ok" } else { "rules_degraded" });
        }

        fn record_outcome(&self, _latency: Duration, result: Result<ResultSource, AnalysisError>) {
            self.push(if result.is_ok() { "outcome_ok" } else { "outcome_err" });
        }
    }

    #[tokio::test]
    async fn metrics_recorder_tracks_request_stages() {
        let metrics = Arc::new(CountingMetrics::default());
        let coordinator = MarkcheckConfig::default()
            .build_coordinator()
            .unwrap()
            .with_metrics(metrics.clone());

        coordinator
            .analyze(AnalysisRequest::new("Thiss is fine.", "en"))
            .await
            .unwrap();
        coordinator
            .analyze(AnalysisRequest::new("Thiss is fine.", "en"))
            .await
            .unwrap();
        assert!(coordinator.analyze(AnalysisRequest::new("   ", "en")).await.is_err());

        assert_eq!(
            metrics.snapshot(),
            vec![
                "normalize_ok",
                "rules_ok",
                "lookup_analysis",
                "outcome_ok",
                "normalize_ok",
                "lookup_cache",
                "outcome_ok",
                "normalize_err",
                "outcome_err",
            ]
        );
    }

    struct Broken;

    impl Rule for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        fn check(&self, _text: &str, _ctx: &RuleContext) -> Result<Vec<RuleMatch>, RuleError> {
            Err(RuleError::Internal("no dictionary".into()))
        }
    }

    #[tokio::test]
    async fn failed_lookup_is_recorded_without_source() {
        let metrics = Arc::new(CountingMetrics::default());
        let engine = RuleEngine::from_rules(vec![Arc::new(Broken)], Duration::from_secs(1)).unwrap();
        let coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            engine,
            Arc::new(ResultCache::new(CacheConfig::default()).unwrap()),
            Arc::new(ResultStore::new(&StoreConfig::InMemory).unwrap()),
        )
        .with_metrics(metrics.clone());

        let err = coordinator
            .analyze(AnalysisRequest::new("Some text.", "en"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RULES_UNAVAILABLE");
        assert_eq!(
            metrics.snapshot(),
            vec!["normalize_ok", "rules_degraded", "lookup_none", "outcome_err"]
        );
    }
}
