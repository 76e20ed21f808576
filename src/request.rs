//! Inbound and outbound wire types.
//!
//! Field names are camelCase on the wire:
//!
//! ```json
//! {"documentText": "# Hello\n\nThiss is a test.", "languageTag": "en",
//!  "ruleConfig": {"sentence-length": {"enabled": false}}}
//! ```

use normalize::Fingerprint;
use rules::RuleConfig;
use serde::{Deserialize, Serialize};

use crate::coordinator::{AnalysisOutcome, MappedFinding, ResultSource};
use crate::error::{AnalysisError, AnalysisWarning};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub document_text: String,
    pub language_tag: String,
    #[serde(default)]
    pub rule_config: Option<RuleConfig>,
    /// Correlation id for logs. Generated when absent.
    #[serde(default)]
    pub request_id: Option<String>,
}

impl AnalysisRequest {
    pub fn new(document_text: impl Into<String>, language_tag: impl Into<String>) -> Self {
        Self {
            document_text: document_text.into(),
            language_tag: language_tag.into(),
            rule_config: None,
            request_id: None,
        }
    }

    pub fn with_rule_config(mut self, rule_config: RuleConfig) -> Self {
        self.rule_config = Some(rule_config);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub fingerprint: Fingerprint,
    pub findings: Vec<MappedFinding>,
    pub source: ResultSource,
    pub persisted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AnalysisWarning>,
}

impl From<AnalysisOutcome> for AnalysisResponse {
    fn from(outcome: AnalysisOutcome) -> Self {
        Self {
            fingerprint: outcome.fingerprint,
            findings: outcome.findings,
            source: outcome.source,
            persisted: outcome.persisted,
            warnings: outcome.warnings,
        }
    }
}

/// `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub code: String,
    pub message: String,
}

impl From<&AnalysisError> for ErrorResponse {
    fn from(err: &AnalysisError) -> Self {
        Self {
            error: ErrorDescriptor {
                code: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_camel_case() {
        let json = r#"{
            "documentText": "Hello",
            "languageTag": "en-GB",
            "ruleConfig": {"spelling": {"enabled": false}}
        }"#;
        let request: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.document_text, "Hello");
        assert_eq!(request.language_tag, "en-GB");
        assert_eq!(
            request.rule_config.unwrap().get("spelling").unwrap().enabled,
            Some(false)
        );
        assert!(request.request_id.is_none());
    }

    #[test]
    fn error_response_shape() {
        let err = AnalysisError::Timeout { timeout_ms: 10 };
        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(json["error"]["code"], "ANALYSIS_TIMEOUT");
        assert_eq!(json["error"]["message"], "analysis timed out after 10 ms");
    }
}
