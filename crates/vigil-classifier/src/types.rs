// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the classifier service API.

use serde::{Deserialize, Serialize};
use vigil_core::{ClassificationResult, Severity};

/// Request body for `POST /classify`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest {
    pub text: String,
    /// Recent conversation context, oldest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
}

/// Response body from `POST /classify`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyResponse {
    pub severity: Severity,
    pub confidence: f32,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub needs_review: bool,
}

impl ClassifyResponse {
    /// Convert into the immutable domain result, clamping confidence to [0, 1].
    pub fn into_result(self) -> ClassificationResult {
        ClassificationResult {
            severity: self.severity,
            confidence: self.confidence.clamp(0.0, 1.0),
            categories: self.categories,
            rationale: self.rationale,
            needs_review: self.needs_review,
        }
    }
}

/// Error body returned by the classifier service on validation failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_empty_history() {
        let req = ClassifyRequest {
            text: "hello".into(),
            history: vec![],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("history"));

        let req = ClassifyRequest {
            text: "hello".into(),
            history: vec!["earlier".into()],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("history"));
    }

    #[test]
    fn response_confidence_is_clamped() {
        let resp = ClassifyResponse {
            severity: Severity::High,
            confidence: 1.7,
            categories: vec![],
            rationale: String::new(),
            needs_review: false,
        };
        assert_eq!(resp.into_result().confidence, 1.0);

        let resp = ClassifyResponse {
            severity: Severity::Low,
            confidence: -0.2,
            categories: vec![],
            rationale: String::new(),
            needs_review: false,
        };
        assert_eq!(resp.into_result().confidence, 0.0);
    }

    #[test]
    fn response_decodes_minimal_body() {
        let json = r#"{"severity":"critical","confidence":0.98}"#;
        let resp: ClassifyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.severity, Severity::Critical);
        assert!(resp.categories.is_empty());
    }
}
