use serde::{Deserialize, Serialize};

/// How serious a finding is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output of a single rule, before the engine stamps it with the rule id
/// and effective severity. Spans are byte offsets into the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub start: usize,
    pub length: usize,
    pub message: String,
    pub suggestion: Option<String>,
}

impl RuleMatch {
    pub fn new(start: usize, length: usize, message: impl Into<String>) -> Self {
        Self {
            start,
            length,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// One reported issue, located in plain-text coordinates.
///
/// Immutable once produced; mapping to source coordinates happens later and
/// yields a separate value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub start: usize,
    pub length: usize,
    pub message: String,
    pub suggestion: Option<String>,
}

impl Finding {
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}
