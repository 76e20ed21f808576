//! Per-request orchestration.
//!
//! ```text
//! Received → Normalized → FingerprintComputed ─┬─ CacheHit ─────────────────────┐
//!                                              └─ CacheMiss ─┬─ Restored ───────┤
//!                                                            └─ Analyzed ───────┤
//!                                                                 ResultMapped ←┘ → Done
//! ```
//!
//! Any stage may end in `Failed`. Cached and stored results hold plain-text
//! spans only; they are mapped onto the current request's source in
//! `ResultMapped`, so two documents that normalize to the same text share a
//! result but each gets its own source positions.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use normalize::{hash_text, normalize, Document, Fingerprint, LineIndex, NormalizeConfig, NormalizedText};
use rules::{Finding, RuleConfig, RuleEngine, Severity};
use serde::{Deserialize, Serialize};
use store::{AnalysisResult, ResultCache, ResultStore};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{AnalysisError, AnalysisWarning};
use crate::metrics::{AnalysisMetrics, MetricsSpan};
use crate::request::AnalysisRequest;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_HTML_CACHE_CAPACITY: usize = 128;
pub const DEFAULT_HTML_CACHE_TTL: Duration = Duration::from_secs(600);

/// Coordinator state-machine stages, in the order a request visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Normalized,
    FingerprintComputed,
    CacheHit,
    CacheMiss,
    Restored,
    Analyzed,
    ResultMapped,
    Done,
    Failed,
}

/// Where the findings of a completed request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Cache,
    Storage,
    Analysis,
}

/// A finding located in the submitted Markdown source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub source_start: usize,
    pub source_length: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl MappedFinding {
    /// `Line L, column C: message`
    pub fn describe(&self) -> String {
        format!("Line {}, column {}: {}", self.line, self.column, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub request_id: String,
    pub fingerprint: Fingerprint,
    pub source: ResultSource,
    /// Ordered by source position, ties broken by rule id.
    pub findings: Vec<MappedFinding>,
    pub warnings: Vec<AnalysisWarning>,
    pub trace: Vec<Stage>,
    /// Whether the result is known to be held by persistent storage.
    pub persisted: bool,
}

impl AnalysisOutcome {
    pub fn is_degraded(&self) -> bool {
        self.warnings.iter().any(|w| {
            matches!(
                w,
                AnalysisWarning::RuleTimeout { .. } | AnalysisWarning::RuleFault { .. }
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub normalize: NormalizeConfig,
    /// Bounds the whole state machine for one request.
    pub request_timeout: Duration,
    /// Process-wide rule settings; request overrides are layered on top.
    pub default_rules: RuleConfig,
    pub html_cache_capacity: usize,
    pub html_cache_ttl: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_rules: RuleConfig::default(),
            html_cache_capacity: DEFAULT_HTML_CACHE_CAPACITY,
            html_cache_ttl: DEFAULT_HTML_CACHE_TTL,
        }
    }
}

/// Stages visited so far. Shared with the running future so the failing
/// stage is still known after a timeout drops it.
#[derive(Default)]
struct Trace(Mutex<Vec<Stage>>);

impl Trace {
    fn enter(&self, stage: Stage) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(stage);
    }

    fn last(&self) -> Option<Stage> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }

    fn into_stages(self) -> Vec<Stage> {
        self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Resolved {
    result: Arc<AnalysisResult>,
    source: ResultSource,
    persisted: bool,
}

/// Runs analysis requests against an injected rule engine, cache and store.
///
/// The coordinator holds no request state between calls and is shared
/// across tasks behind an `Arc`.
pub struct Coordinator {
    config: CoordinatorConfig,
    engine: RuleEngine,
    cache: Arc<ResultCache>,
    store: Arc<ResultStore>,
    metrics: Option<Arc<dyn AnalysisMetrics>>,
    html_cache: Mutex<LruCache<String, (Arc<str>, Instant)>>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        engine: RuleEngine,
        cache: Arc<ResultCache>,
        store: Arc<ResultStore>,
    ) -> Self {
        let html_capacity =
            NonZeroUsize::new(config.html_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            engine,
            cache,
            store,
            metrics: None,
            html_cache: Mutex::new(LruCache::new(html_capacity)),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn AnalysisMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Analyze one document. Rule failures degrade the outcome with warnings;
    /// only request-level failures are returned as errors.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = info_span!(
            "markcheck.analyze",
            request_id = %request_id,
            language = %request.language_tag
        );
        let outcome_metrics = MetricsSpan::start(&self.metrics);
        let started = Instant::now();
        let timeout = self.config.request_timeout;
        let trace = Trace::default();

        let result = tokio::time::timeout(timeout, self.run(request, &trace))
            .instrument(span.clone())
            .await
            .unwrap_or_else(|_| {
                Err(AnalysisError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            });

        let _entered = span.enter();
        match result {
            Ok(mut outcome) => {
                trace.enter(Stage::Done);
                outcome.request_id = request_id;
                outcome.trace = trace.into_stages();
                info!(
                    fingerprint = %outcome.fingerprint,
                    source = ?outcome.source,
                    findings = outcome.findings.len(),
                    warnings = outcome.warnings.len(),
                    persisted = outcome.persisted,
                    elapsed_micros = started.elapsed().as_micros() as u64,
                    "analysis_success"
                );
                if let Some(span) = outcome_metrics {
                    span.record_outcome(Ok(outcome.source));
                }
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    stage = ?trace.last(),
                    code = err.code(),
                    error = %err,
                    elapsed_micros = started.elapsed().as_micros() as u64,
                    "analysis_failed"
                );
                trace.enter(Stage::Failed);
                if let Some(span) = outcome_metrics {
                    span.record_outcome(Err(err.clone()));
                }
                Err(err)
            }
        }
    }

    async fn run(&self, request: AnalysisRequest, trace: &Trace) -> Result<AnalysisOutcome, AnalysisError> {
        trace.enter(Stage::Received);
        let rules = self.effective_rules(request.rule_config.as_ref())?;

        let document = Document::new(request.document_text, request.language_tag);
        let normalized = self.normalize(&document)?;
        trace.enter(Stage::Normalized);
        let mut warnings: Vec<AnalysisWarning> = normalized
            .diagnostics()
            .iter()
            .cloned()
            .map(AnalysisWarning::from)
            .collect();

        let fingerprint = normalized.fingerprint(&self.engine.profile_digest(&rules));
        trace.enter(Stage::FingerprintComputed);

        let lookup_metrics = MetricsSpan::start(&self.metrics);
        let resolved = match self.cache.get(&fingerprint) {
            Some(result) => {
                trace.enter(Stage::CacheHit);
                debug!(fingerprint = %fingerprint, "cache_hit");
                Ok(Resolved {
                    result,
                    source: ResultSource::Cache,
                    persisted: true,
                })
            }
            None => {
                trace.enter(Stage::CacheMiss);
                match self.restore(fingerprint, &mut warnings).await {
                    Some(result) => {
                        trace.enter(Stage::Restored);
                        self.cache.put(fingerprint, Arc::clone(&result));
                        Ok(Resolved {
                            result,
                            source: ResultSource::Storage,
                            persisted: true,
                        })
                    }
                    None => {
                        let fresh = self
                            .analyze_fresh(&normalized, fingerprint, &rules, &mut warnings)
                            .await;
                        if fresh.is_ok() {
                            trace.enter(Stage::Analyzed);
                        }
                        fresh
                    }
                }
            }
        };
        if let Some(span) = lookup_metrics {
            span.record_lookup(resolved.as_ref().ok().map(|r| r.source));
        }
        let resolved = resolved?;

        let findings = map_findings(&document, &normalized, &resolved.result.findings);
        trace.enter(Stage::ResultMapped);

        Ok(AnalysisOutcome {
            request_id: String::new(),
            fingerprint,
            source: resolved.source,
            findings,
            warnings,
            trace: Vec::new(),
            persisted: resolved.persisted,
        })
    }

    fn effective_rules(&self, requested: Option<&RuleConfig>) -> Result<RuleConfig, AnalysisError> {
        match requested {
            Some(requested) => {
                self.engine.validate(requested)?;
                Ok(requested.merged_over(&self.config.default_rules))
            }
            None => Ok(self.config.default_rules.clone()),
        }
    }

    fn normalize(&self, document: &Document) -> Result<NormalizedText, AnalysisError> {
        let metrics = MetricsSpan::start(&self.metrics);
        let result = normalize(document, &self.config.normalize);
        if let Some(span) = metrics {
            span.record_normalize(result.as_ref().map(|_| ()).map_err(Clone::clone));
        }
        Ok(result?)
    }

    /// Look the fingerprint up in persistent storage. Storage failures are
    /// downgraded to a warning and treated as a miss.
    async fn restore(
        &self,
        fingerprint: Fingerprint,
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Option<Arc<AnalysisResult>> {
        let store = Arc::clone(&self.store);
        let lookup = tokio::task::spawn_blocking(move || store.get(&fingerprint)).await;
        match lookup {
            Ok(Ok(Some(result))) if result.fingerprint == fingerprint => {
                debug!(fingerprint = %fingerprint, "storage_hit");
                Some(Arc::new(result))
            }
            Ok(Ok(Some(_))) => {
                warn!(fingerprint = %fingerprint, "storage_fingerprint_mismatch");
                None
            }
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                warn!(fingerprint = %fingerprint, error = %err, "storage_read_failed");
                warnings.push(AnalysisWarning::StorageUnavailable {
                    message: err.to_string(),
                });
                None
            }
            Err(join_err) => {
                warn!(fingerprint = %fingerprint, error = %join_err, "storage_read_failed");
                warnings.push(AnalysisWarning::StorageUnavailable {
                    message: join_err.to_string(),
                });
                None
            }
        }
    }

    async fn analyze_fresh(
        &self,
        normalized: &NormalizedText,
        fingerprint: Fingerprint,
        rules: &RuleConfig,
        warnings: &mut Vec<AnalysisWarning>,
    ) -> Result<Resolved, AnalysisError> {
        let rules_metrics = MetricsSpan::start(&self.metrics);
        let report = self
            .engine
            .run(Arc::from(normalized.as_str()), normalized.language(), rules)
            .await;
        if let Some(span) = rules_metrics {
            span.record_rules(report.attempted, report.failures.len());
        }

        if report.all_failed() {
            return Err(AnalysisError::RulesUnavailable {
                attempted: report.attempted,
                failures: report.failures,
            });
        }

        let degraded = report.is_degraded();
        warnings.extend(report.failures.into_iter().map(AnalysisWarning::from));
        let result = Arc::new(AnalysisResult::new(fingerprint, report.findings));

        // A partial result must not be served to later requests as if complete.
        if degraded {
            return Ok(Resolved {
                result,
                source: ResultSource::Analysis,
                persisted: false,
            });
        }

        let persisted = self.persist(Arc::clone(&result), warnings).await;
        // The cache only holds results that storage also holds.
        if persisted {
            self.cache.put(fingerprint, Arc::clone(&result));
        }
        Ok(Resolved {
            result,
            source: ResultSource::Analysis,
            persisted,
        })
    }

    async fn persist(&self, result: Arc<AnalysisResult>, warnings: &mut Vec<AnalysisWarning>) -> bool {
        let store = Arc::clone(&self.store);
        let fingerprint = result.fingerprint;
        let write = tokio::task::spawn_blocking(move || store.put(&result)).await;
        let failure = match write {
            Ok(Ok(())) => return true,
            Ok(Err(err)) => err.to_string(),
            Err(join_err) => join_err.to_string(),
        };
        warn!(fingerprint = %fingerprint, error = %failure, "storage_write_failed");
        warnings.push(AnalysisWarning::StorageUnavailable { message: failure });
        false
    }

    /// Render Markdown to HTML, reusing a recent rendering of identical input.
    pub fn render_html(&self, markdown: &str) -> Arc<str> {
        let key = hash_text(markdown);
        {
            let mut cache = self.html_cache.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.get(&key) {
                Some((html, rendered)) if rendered.elapsed() < self.config.html_cache_ttl => {
                    debug!(key = %key, "html_cache_hit");
                    return Arc::clone(html);
                }
                Some(_) => {
                    cache.pop(&key);
                }
                None => {}
            }
        }

        let html: Arc<str> = Arc::from(normalize::render_html(markdown));
        self.html_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, (Arc::clone(&html), Instant::now()));
        html
    }
}

fn map_findings(document: &Document, normalized: &NormalizedText, findings: &[Finding]) -> Vec<MappedFinding> {
    let lines = LineIndex::new(document.text());
    let mut mapped: Vec<MappedFinding> = findings
        .iter()
        .map(|finding| {
            let span = normalized.map_span(finding.start, finding.length);
            let (line, column) = lines.line_col(span.start);
            MappedFinding {
                rule_id: finding.rule_id.clone(),
                severity: finding.severity,
                source_start: span.start,
                source_length: span.length,
                line,
                column,
                message: finding.message.clone(),
                suggestion: finding.suggestion.clone(),
            }
        })
        .collect();
    // Plain order is source order; the stable sort only guards against
    // separators that widen onto the same source byte.
    mapped.sort_by(|a, b| {
        a.source_start
            .cmp(&b.source_start)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    mapped
}
