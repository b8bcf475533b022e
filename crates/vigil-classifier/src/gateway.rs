// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The resilient classification gateway.
//!
//! Wraps the classifier client behind the circuit breaker and retry policy.
//! The gateway never surfaces an error to its caller: when the breaker is
//! open, retries are exhausted, or the input was invalid, it returns a
//! degraded result immediately. No alert is ever dispatched from a degraded
//! result -- silence is preferred over a stale or fabricated severity.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use vigil_config::model::ClassifierConfig;
use vigil_core::{AdapterType, Classification, HealthStatus, PluginAdapter, VigilError};

use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::client::ClassifierClient;
use crate::retry::RetryPolicy;

/// Resilient gateway over the external classifier service.
pub struct ClassificationGateway {
    client: ClassifierClient,
    breaker: Mutex<CircuitBreaker>,
    retry: RetryPolicy,
}

impl ClassificationGateway {
    /// Builds the gateway from configuration.
    pub fn new(config: &ClassifierConfig) -> Result<Self, VigilError> {
        let client = ClassifierClient::new(config)?;
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            failure_window: Duration::from_secs(config.breaker_window_secs),
            open_wait: Duration::from_secs(config.breaker_open_secs),
            open_wait_max: Duration::from_secs(config.breaker_open_max_secs),
        });
        let retry = RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_ms),
            Duration::from_millis(config.retry_cap_ms),
        );
        Ok(Self {
            client,
            breaker: Mutex::new(breaker),
            retry,
        })
    }

    /// Classifies a message with its recent history.
    ///
    /// Never blocks on an open breaker and never returns an error; callers
    /// receive either a scored result or a degraded marker.
    pub async fn classify(&self, text: &str, history: &[String]) -> Classification {
        {
            let mut breaker = self.breaker.lock().await;
            if !breaker.try_acquire() {
                debug!("breaker open, returning degraded classification");
                metrics::counter!("vigil_classifications_total", "outcome" => "degraded_open")
                    .increment(1);
                return Classification::Degraded {
                    reason: "classifier circuit open".to_string(),
                };
            }
        }

        let outcome = self
            .retry
            .run(|| self.client.classify(text, history))
            .await;

        match outcome {
            Ok(result) => {
                self.breaker.lock().await.on_success();
                metrics::counter!("vigil_classifications_total", "outcome" => "scored")
                    .increment(1);
                Classification::Scored(result)
            }
            Err(e) if e.is_transient() => {
                self.breaker.lock().await.on_failure();
                warn!(error = %e, "classifier unavailable after retries");
                metrics::counter!("vigil_classifications_total", "outcome" => "degraded_failure")
                    .increment(1);
                Classification::Degraded {
                    reason: format!("classifier unavailable: {e}"),
                }
            }
            Err(e) => {
                // The service answered; only transport-class failures count
                // against the breaker.
                self.breaker.lock().await.on_success();
                warn!(error = %e, "classification rejected as invalid");
                metrics::counter!("vigil_classifications_total", "outcome" => "invalid")
                    .increment(1);
                Classification::Degraded {
                    reason: format!("no actionable classification: {e}"),
                }
            }
        }
    }

    /// Current breaker state, for diagnostics.
    pub async fn breaker_state(&self) -> BreakerState {
        self.breaker.lock().await.state()
    }
}

#[async_trait]
impl PluginAdapter for ClassificationGateway {
    fn name(&self) -> &str {
        "classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        match self.client.health().await {
            Ok(()) => match self.breaker_state().await {
                BreakerState::Closed => Ok(HealthStatus::Healthy),
                state => Ok(HealthStatus::Degraded(format!(
                    "service reachable but breaker {}",
                    state.as_str()
                ))),
            },
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), VigilError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Severity;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_config(base_url: &str) -> ClassifierConfig {
        ClassifierConfig {
            base_url: base_url.to_string(),
            max_retries: 1,
            retry_base_ms: 1,
            retry_cap_ms: 5,
            breaker_failure_threshold: 2,
            breaker_window_secs: 60,
            breaker_open_secs: 1,
            breaker_open_max_secs: 4,
            ..ClassifierConfig::default()
        }
    }

    fn scored_body() -> serde_json::Value {
        serde_json::json!({"severity": "high", "confidence": 0.9})
    }

    #[tokio::test]
    async fn scored_result_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(scored_body()))
            .mount(&server)
            .await;

        let gateway = ClassificationGateway::new(&gateway_config(&server.uri())).unwrap();
        let classification = gateway.classify("message", &[]).await;
        assert_eq!(classification.severity(), Some(Severity::High));
    }

    #[tokio::test]
    async fn transient_failure_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(scored_body()))
            .mount(&server)
            .await;

        let gateway = ClassificationGateway::new(&gateway_config(&server.uri())).unwrap();
        let classification = gateway.classify("message", &[]).await;
        assert!(!classification.is_degraded());
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_and_trip_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gateway = ClassificationGateway::new(&gateway_config(&server.uri())).unwrap();

        // Two degraded calls trip the threshold-2 breaker.
        assert!(gateway.classify("one", &[]).await.is_degraded());
        assert!(gateway.classify("two", &[]).await.is_degraded());
        assert_eq!(gateway.breaker_state().await, BreakerState::Open);

        // With the breaker open the gateway fails fast: the mock sees no
        // further requests.
        let before = server.received_requests().await.unwrap().len();
        let degraded = gateway.classify("three", &[]).await;
        assert!(degraded.is_degraded());
        let after = server.received_requests().await.unwrap().len();
        assert_eq!(before, after, "open breaker must not hit the network");
    }

    #[tokio::test]
    async fn half_open_trial_recovers_the_circuit() {
        let server = MockServer::start().await;
        // Four failures cover the initial attempts and their retries.
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(4)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(scored_body()))
            .mount(&server)
            .await;

        let gateway = ClassificationGateway::new(&gateway_config(&server.uri())).unwrap();
        gateway.classify("one", &[]).await;
        gateway.classify("two", &[]).await;
        assert_eq!(gateway.breaker_state().await, BreakerState::Open);

        // Wait out the 1s open window, then the trial call closes it.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let classification = gateway.classify("three", &[]).await;
        assert!(!classification.is_degraded());
        assert_eq!(gateway.breaker_state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn invalid_input_degrades_without_breaker_damage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/classify"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "empty text"})),
            )
            .mount(&server)
            .await;

        let gateway = ClassificationGateway::new(&gateway_config(&server.uri())).unwrap();
        for _ in 0..4 {
            let classification = gateway.classify("", &[]).await;
            assert!(classification.is_degraded());
        }
        assert_eq!(gateway.breaker_state().await, BreakerState::Closed);
    }
}
