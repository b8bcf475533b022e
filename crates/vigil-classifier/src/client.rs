// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the external classifier service.
//!
//! Single-shot request construction and error classification. Retry and
//! circuit breaking live in the [`gateway`](crate::gateway); this client
//! only decides whether a failure is transient.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use vigil_config::model::ClassifierConfig;
use vigil_core::{ClassificationResult, VigilError};

use crate::types::{ApiErrorResponse, ClassifyRequest, ClassifyResponse};

/// HTTP client for classifier service communication.
#[derive(Debug, Clone)]
pub struct ClassifierClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClassifierClient {
    /// Creates a new classifier client from configuration.
    pub fn new(config: &ClassifierConfig) -> Result<Self, VigilError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(ref api_key) = config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                VigilError::Config(format!("invalid classifier.api_key header value: {e}"))
            })?;
            headers.insert("authorization", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VigilError::Classifier {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
                transient: false,
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sends a single classification request.
    ///
    /// Timeouts, connection failures, and 429/5xx responses surface as
    /// transient errors; 4xx responses and undecodable bodies do not.
    pub async fn classify(
        &self,
        text: &str,
        history: &[String],
    ) -> Result<ClassificationResult, VigilError> {
        let request = ClassifyRequest {
            text: text.to_string(),
            history: history.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/classify", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| VigilError::Classifier {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
                transient: true,
            })?;

        let status = response.status();
        debug!(status = %status, "classifier response received");

        if status.is_success() {
            let body = response.text().await.map_err(|e| VigilError::Classifier {
                message: format!("failed to read response body: {e}"),
                source: Some(Box::new(e)),
                transient: true,
            })?;
            let decoded: ClassifyResponse =
                serde_json::from_str(&body).map_err(|e| VigilError::Classifier {
                    message: format!("failed to parse classifier response: {e}"),
                    source: Some(Box::new(e)),
                    transient: false,
                })?;
            return Ok(decoded.into_result());
        }

        let transient = is_transient_status(status);
        let body = response.text().await.unwrap_or_default();
        let message = if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(&body) {
            format!("classifier returned {status}: {}", api_err.error)
        } else {
            format!("classifier returned {status}: {body}")
        };
        Err(VigilError::Classifier {
            message,
            source: None,
            transient,
        })
    }

    /// Probes `GET /health`. Any non-2xx response is unhealthy.
    pub async fn health(&self) -> Result<(), VigilError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| VigilError::Classifier {
                message: format!("health probe failed: {e}"),
                source: Some(Box::new(e)),
                transient: true,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(VigilError::Classifier {
                message: format!("health probe returned {status}"),
                source: None,
                transient: is_transient_status(status),
            })
        }
    }
}

/// Returns true for HTTP status codes that indicate transient failures.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}
