use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::finding::Severity;

/// Per-rule overrides. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleSettings {
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
}

/// Rule configuration keyed by rule id.
///
/// Serialized as a plain map, e.g. `{"spelling": {"enabled": false}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleConfig {
    pub rules: BTreeMap<String, RuleSettings>,
}

impl RuleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable(mut self, id: impl Into<String>) -> Self {
        self.rules.entry(id.into()).or_default().enabled = Some(false);
        self
    }

    pub fn enable(mut self, id: impl Into<String>) -> Self {
        self.rules.entry(id.into()).or_default().enabled = Some(true);
        self
    }

    pub fn with_severity(mut self, id: impl Into<String>, severity: Severity) -> Self {
        self.rules.entry(id.into()).or_default().severity = Some(severity);
        self
    }

    pub fn get(&self, id: &str) -> Option<&RuleSettings> {
        self.rules.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Layer `self` over `base`: fields set here win.
    pub fn merged_over(&self, base: &RuleConfig) -> RuleConfig {
        let mut merged = base.clone();
        for (id, settings) in &self.rules {
            let entry = merged.rules.entry(id.clone()).or_default();
            if settings.enabled.is_some() {
                entry.enabled = settings.enabled;
            }
            if settings.severity.is_some() {
                entry.severity = settings.severity;
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_overrides_defaults_field_by_field() {
        let defaults = RuleConfig::new()
            .disable("sentence-length")
            .with_severity("spelling", Severity::Warning);
        let request = RuleConfig::new().enable("sentence-length");

        let merged = request.merged_over(&defaults);
        assert_eq!(merged.get("sentence-length").unwrap().enabled, Some(true));
        assert_eq!(merged.get("spelling").unwrap().severity, Some(Severity::Warning));
    }

    #[test]
    fn parses_plain_map() {
        let cfg: RuleConfig =
            serde_json::from_str(r#"{"spelling": {"enabled": false, "severity": "info"}}"#).unwrap();
        let spelling = cfg.get("spelling").unwrap();
        assert_eq!(spelling.enabled, Some(false));
        assert_eq!(spelling.severity, Some(Severity::Info));
    }

    #[test]
    fn unknown_setting_rejected() {
        let parsed: Result<RuleConfig, _> = serde_json::from_str(r#"{"spelling": {"enbled": true}}"#);
        assert!(parsed.is_err());
    }
}
