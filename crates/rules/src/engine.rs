//! Rule fan-out and fan-in.
//!
//! Every enabled rule runs on the blocking pool under its own timeout. A rule
//! that errors, panics or overruns is recorded as a [`RuleFailure`] and the
//! remaining rules still contribute their findings.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::config::RuleConfig;
use crate::finding::{Finding, RuleMatch, Severity};
use crate::registry::{RuleKind, RuleOptions};
use crate::rule::{Rule, RuleContext, RuleError};

pub const DEFAULT_RULE_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration errors raised before any rule runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown rule `{0}`")]
    UnknownRule(String),
    #[error("rule `{0}` registered twice")]
    DuplicateRule(String),
}

/// Why a single rule contributed nothing to a report.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleFailure {
    #[error("rule `{rule_id}` timed out after {timeout_ms} ms")]
    Timeout { rule_id: String, timeout_ms: u64 },
    #[error("rule `{rule_id}` failed: {message}")]
    Fault { rule_id: String, message: String },
}

impl RuleFailure {
    pub fn rule_id(&self) -> &str {
        match self {
            RuleFailure::Timeout { rule_id, .. } | RuleFailure::Fault { rule_id, .. } => rule_id,
        }
    }
}

/// Combined output of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    /// Sorted by `(start, rule_id)`.
    pub findings: Vec<Finding>,
    pub failures: Vec<RuleFailure>,
    /// Number of rules that were scheduled.
    pub attempted: usize,
}

impl EngineReport {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted
    }
}

/// Effective settings for one rule after layering config over defaults.
#[derive(Debug, Clone, Serialize)]
struct EffectiveRule<'a> {
    id: &'a str,
    enabled: bool,
    severity: Severity,
}

pub struct RuleEngine {
    rules: Vec<Arc<dyn Rule>>,
    options: RuleOptions,
    rule_timeout: Duration,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rule_ids().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("rule_timeout", &self.rule_timeout)
            .finish()
    }
}

impl RuleEngine {
    /// Engine with every built-in rule registered.
    pub fn builtin(options: RuleOptions, rule_timeout: Duration) -> Self {
        let rules = RuleKind::ALL
            .into_iter()
            .map(|kind| kind.build(&options))
            .collect();
        Self {
            rules,
            options,
            rule_timeout,
        }
    }

    /// Engine over an explicit rule set.
    pub fn from_rules(
        rules: Vec<Arc<dyn Rule>>,
        rule_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id().to_string()) {
                return Err(EngineError::DuplicateRule(rule.id().to_string()));
            }
        }
        Ok(Self {
            rules,
            options: RuleOptions::default(),
            rule_timeout,
        })
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.id())
    }

    pub fn rule_timeout(&self) -> Duration {
        self.rule_timeout
    }

    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    /// Reject configuration that names rules this engine does not know.
    pub fn validate(&self, config: &RuleConfig) -> Result<(), EngineError> {
        for id in config.rules.keys() {
            if !self.rules.iter().any(|rule| rule.id() == id) {
                return Err(EngineError::UnknownRule(id.clone()));
            }
        }
        Ok(())
    }

    /// Deterministic byte digest of the effective rule profile.
    ///
    /// Two configs that enable the same rules at the same severities with the
    /// same options produce the same digest.
    pub fn profile_digest(&self, config: &RuleConfig) -> Vec<u8> {
        let mut effective: Vec<_> = self.effective(config).collect();
        effective.sort_by(|a, b| a.id.cmp(b.id));
        let mut digest = serde_json::to_vec(&effective).unwrap_or_default();
        digest.push(0x1e);
        digest.extend(serde_json::to_vec(&self.options).unwrap_or_default());
        digest
    }

    fn effective<'a>(&'a self, config: &'a RuleConfig) -> impl Iterator<Item = EffectiveRule<'a>> {
        self.rules.iter().map(move |rule| {
            let settings = config.get(rule.id()).copied().unwrap_or_default();
            EffectiveRule {
                id: rule.id(),
                enabled: settings.enabled.unwrap_or(true),
                severity: settings.severity.unwrap_or_else(|| rule.default_severity()),
            }
        })
    }

    /// Run every enabled rule that supports `language` against `text`.
    pub async fn run(&self, text: Arc<str>, language: &str, config: &RuleConfig) -> EngineReport {
        let started = Instant::now();
        let timeout = self.rule_timeout;
        let mut pending = Vec::new();

        for (rule, effective) in self.rules.iter().zip(self.effective(config)) {
            if !effective.enabled {
                continue;
            }
            if !rule.supports(language) {
                debug!(rule_id = effective.id, language, "rule_skipped_language");
                continue;
            }

            let rule = Arc::clone(rule);
            let rule_id = effective.id.to_string();
            let severity = effective.severity;
            let text = Arc::clone(&text);
            let cancelled = Arc::new(AtomicBool::new(false));
            let ctx = RuleContext::new(language)
                .with_deadline(Instant::now() + timeout)
                .with_cancel_flag(Arc::clone(&cancelled));

            pending.push(async move {
                let task = tokio::task::spawn_blocking(move || {
                    let matches = rule.check(&text, &ctx)?;
                    validate_spans(&text, &matches)?;
                    Ok::<_, RuleError>(matches)
                });
                let outcome = match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(Ok(matches))) => Ok(matches),
                    Ok(Ok(Err(RuleError::DeadlineExceeded))) | Err(_) => {
                        cancelled.store(true, Ordering::Relaxed);
                        Err(RuleFailure::Timeout {
                            rule_id: rule_id.clone(),
                            timeout_ms: timeout.as_millis() as u64,
                        })
                    }
                    Ok(Ok(Err(RuleError::Internal(message)))) => Err(RuleFailure::Fault {
                        rule_id: rule_id.clone(),
                        message,
                    }),
                    Ok(Err(join_err)) => Err(RuleFailure::Fault {
                        rule_id: rule_id.clone(),
                        message: join_error_message(join_err),
                    }),
                };
                (rule_id, severity, outcome)
            });
        }

        let attempted = pending.len();
        let mut report = EngineReport {
            attempted,
            ..EngineReport::default()
        };

        for (rule_id, severity, outcome) in join_all(pending).await {
            match outcome {
                Ok(matches) => report.findings.extend(matches.into_iter().map(|m| Finding {
                    rule_id: rule_id.clone(),
                    severity,
                    start: m.start,
                    length: m.length,
                    message: m.message,
                    suggestion: m.suggestion,
                })),
                Err(failure) => {
                    warn!(rule_id = %rule_id, error = %failure, "rule_failed");
                    report.failures.push(failure);
                }
            }
        }

        report
            .findings
            .sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.rule_id.cmp(&b.rule_id)));

        debug!(
            attempted,
            findings = report.findings.len(),
            failures = report.failures.len(),
            elapsed_micros = started.elapsed().as_micros() as u64,
            "rules_complete"
        );
        report
    }
}

fn validate_spans(text: &str, matches: &[RuleMatch]) -> Result<(), RuleError> {
    for m in matches {
        let in_bounds = m.end() <= text.len()
            && text.is_char_boundary(m.start)
            && text.is_char_boundary(m.end());
        if !in_bounds {
            return Err(RuleError::Internal(format!(
                "span {}..{} is outside the text",
                m.start,
                m.end()
            )));
        }
    }
    Ok(())
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "rule task cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
