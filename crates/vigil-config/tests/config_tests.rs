// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading, merging, and validation.

use vigil_config::{ConfigError, load_and_validate_str, load_config_from_str};
use vigil_core::Severity;

#[test]
fn empty_string_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.agent.name, "ash");
    assert_eq!(config.agent.log_level, "info");
    assert_eq!(config.alerts.min_severity, Severity::Medium);
    assert_eq!(config.escalation.min_severity, Severity::High);
}

#[test]
fn toml_overrides_defaults() {
    let toml = r#"
[agent]
name = "ash-staging"
log_level = "debug"

[alerts]
min_severity = "low"
cooldown_secs = 120

[escalation]
delay_secs = 60
"#;
    let config = load_config_from_str(toml).unwrap();
    assert_eq!(config.agent.name, "ash-staging");
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.alerts.min_severity, Severity::Low);
    assert_eq!(config.alerts.cooldown_secs, 120);
    assert_eq!(config.escalation.delay_secs, 60);
    // Untouched sections keep compiled defaults.
    assert_eq!(config.session.idle_timeout_secs, 300);
}

#[test]
fn unknown_key_produces_suggestion() {
    let toml = r#"
[alerts]
cooldwon_secs = 300
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    let has_suggestion = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { suggestion: Some(s), .. } if s == "cooldown_secs"
        )
    });
    assert!(has_suggestion, "expected a did-you-mean suggestion: {errors:?}");
}

#[test]
fn invalid_severity_string_is_rejected() {
    let toml = r#"
[alerts]
min_severity = "urgent"
"#;
    assert!(load_and_validate_str(toml).is_err());
}

#[test]
fn validation_runs_after_successful_parse() {
    let toml = r#"
[session]
idle_timeout_secs = 1800
max_duration_secs = 300
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors.iter().any(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn classifier_section_round_trips() {
    let toml = r#"
[classifier]
base_url = "https://classifier.internal:8443"
api_key = "secret-token"
timeout_secs = 5
max_retries = 3
breaker_failure_threshold = 3
breaker_open_secs = 10
breaker_open_max_secs = 120
"#;
    let config = load_and_validate_str(toml).unwrap();
    assert_eq!(config.classifier.base_url, "https://classifier.internal:8443");
    assert_eq!(config.classifier.api_key.as_deref(), Some("secret-token"));
    assert_eq!(config.classifier.max_retries, 3);
    assert_eq!(config.classifier.breaker_failure_threshold, 3);
}

#[test]
fn followup_band_parses() {
    let toml = r#"
[followup]
min_session_secs = 30
max_session_secs = 3600
recent_window_secs = 43200
"#;
    let config = load_and_validate_str(toml).unwrap();
    assert_eq!(config.followup.min_session_secs, 30);
    assert_eq!(config.followup.max_session_secs, 3600);
    assert_eq!(config.followup.recent_window_secs, 43200);
}
