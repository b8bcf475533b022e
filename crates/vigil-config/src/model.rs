// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Vigil crisis-response engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use vigil_core::Severity;

/// Top-level Vigil configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VigilConfig {
    /// Agent identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Classifier service and resilience settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Alert dispatch, routing, and cooldown settings.
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Auto-initiate escalation settings.
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Ash conversation session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Follow-up check-in settings.
    #[serde(default)]
    pub followup: FollowupConfig,

    /// Console transport settings.
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// Agent identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent persona.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "ash".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("vigil").join("vigil.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("vigil.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Classifier service configuration, including circuit breaker and retry
/// policy for the classification gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Base URL of the classifier service.
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,

    /// Bearer token for the classifier service. `None` sends no auth header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of recent messages sent as context with each classification.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Retries per allowed attempt, for transient failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff, in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Cap on a single retry delay, in milliseconds.
    #[serde(default = "default_retry_cap_ms")]
    pub retry_cap_ms: u64,

    /// Failures within the rolling window before the breaker opens.
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,

    /// Rolling window for counting failures, in seconds.
    #[serde(default = "default_breaker_window_secs")]
    pub breaker_window_secs: u64,

    /// Initial open-state cooldown before a half-open trial, in seconds.
    #[serde(default = "default_breaker_open_secs")]
    pub breaker_open_secs: u64,

    /// Ceiling for the backed-off open cooldown, in seconds.
    #[serde(default = "default_breaker_open_max_secs")]
    pub breaker_open_max_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_classifier_base_url(),
            api_key: None,
            timeout_secs: default_classifier_timeout_secs(),
            history_limit: default_history_limit(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_cap_ms: default_retry_cap_ms(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_window_secs: default_breaker_window_secs(),
            breaker_open_secs: default_breaker_open_secs(),
            breaker_open_max_secs: default_breaker_open_max_secs(),
        }
    }
}

fn default_classifier_base_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    10
}

fn default_history_limit() -> usize {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_ms() -> u64 {
    250
}

fn default_retry_cap_ms() -> u64 {
    5_000
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_window_secs() -> u64 {
    120
}

fn default_breaker_open_secs() -> u64 {
    30
}

fn default_breaker_open_max_secs() -> u64 {
    300
}

/// Alert dispatch, severity routing, and cooldown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    /// Minimum severity that dispatches an alert.
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,

    /// Per-user alert suppression window in seconds. Severity-agnostic:
    /// a low-tier alert's cooldown also suppresses a later high-tier one.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Destination channel for low-severity alerts.
    #[serde(default = "default_channel_low")]
    pub channel_low: String,

    /// Destination channel for medium-severity alerts.
    #[serde(default = "default_channel_medium")]
    pub channel_medium: String,

    /// Destination channel for high-severity alerts.
    #[serde(default = "default_channel_high")]
    pub channel_high: String,

    /// Destination channel for critical-severity alerts.
    #[serde(default = "default_channel_critical")]
    pub channel_critical: String,

    /// Severity at or above which the response-team broadcast marker is
    /// attached to the alert post.
    #[serde(default = "default_broadcast_min_severity")]
    pub broadcast_min_severity: Severity,

    /// Mention string used as the broadcast marker.
    #[serde(default = "default_team_mention")]
    pub team_mention: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_severity: default_min_severity(),
            cooldown_secs: default_cooldown_secs(),
            channel_low: default_channel_low(),
            channel_medium: default_channel_medium(),
            channel_high: default_channel_high(),
            channel_critical: default_channel_critical(),
            broadcast_min_severity: default_broadcast_min_severity(),
            team_mention: default_team_mention(),
        }
    }
}

fn default_min_severity() -> Severity {
    Severity::Medium
}

fn default_cooldown_secs() -> u64 {
    600
}

fn default_channel_low() -> String {
    "crt-triage".to_string()
}

fn default_channel_medium() -> String {
    "crt-alerts".to_string()
}

fn default_channel_high() -> String {
    "crt-urgent".to_string()
}

fn default_channel_critical() -> String {
    "crt-critical".to_string()
}

fn default_broadcast_min_severity() -> Severity {
    Severity::High
}

fn default_team_mention() -> String {
    "@crisis-response".to_string()
}

/// Auto-initiate escalation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    /// Enable automatic AI contact when humans are slow to respond.
    #[serde(default = "default_escalation_enabled")]
    pub enabled: bool,

    /// Seconds an alert may sit unacknowledged before auto-initiate fires.
    #[serde(default = "default_escalation_delay_secs")]
    pub delay_secs: u64,

    /// Minimum severity eligible for automatic contact. Checked both when
    /// the timer is armed and again when it fires.
    #[serde(default = "default_escalation_min_severity")]
    pub min_severity: Severity,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: default_escalation_enabled(),
            delay_secs: default_escalation_delay_secs(),
            min_severity: default_escalation_min_severity(),
        }
    }
}

fn default_escalation_enabled() -> bool {
    true
}

fn default_escalation_delay_secs() -> u64 {
    300
}

fn default_escalation_min_severity() -> Severity {
    Severity::High
}

/// Ash conversation session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Seconds without an inbound message before the session idles out.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Hard ceiling on session duration in seconds, regardless of activity.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// Role names whose channel activity counts as a human hand-off.
    #[serde(default = "default_handoff_roles")]
    pub handoff_roles: Vec<String>,

    /// Transcript entries supplied to the reply generator.
    #[serde(default = "default_session_history_limit")]
    pub history_limit: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            max_duration_secs: default_max_duration_secs(),
            handoff_roles: default_handoff_roles(),
            history_limit: default_session_history_limit(),
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_max_duration_secs() -> u64 {
    1800
}

fn default_handoff_roles() -> Vec<String> {
    vec!["crisis-response".to_string()]
}

fn default_session_history_limit() -> i64 {
    20
}

/// Follow-up check-in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FollowupConfig {
    /// Enable follow-up check-ins after sessions end.
    #[serde(default = "default_followup_enabled")]
    pub enabled: bool,

    /// Seconds after session end before the check-in fires.
    #[serde(default = "default_followup_delay_secs")]
    pub delay_secs: u64,

    /// Minimum severity at session end to qualify for a follow-up.
    #[serde(default = "default_followup_min_severity")]
    pub min_severity: Severity,

    /// Sessions shorter than this many seconds are not followed up.
    #[serde(default = "default_min_session_secs")]
    pub min_session_secs: u64,

    /// Sessions longer than this many seconds are not followed up.
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,

    /// A user with any follow-up newer than this window is not scheduled
    /// again (cross-session rate limit), in seconds.
    #[serde(default = "default_recent_window_secs")]
    pub recent_window_secs: u64,

    /// A DM reply within this many seconds of a sent check-in correlates
    /// back to it and starts a continuation session.
    #[serde(default = "default_reply_window_secs")]
    pub reply_window_secs: u64,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            enabled: default_followup_enabled(),
            delay_secs: default_followup_delay_secs(),
            min_severity: default_followup_min_severity(),
            min_session_secs: default_min_session_secs(),
            max_session_secs: default_max_session_secs(),
            recent_window_secs: default_recent_window_secs(),
            reply_window_secs: default_reply_window_secs(),
        }
    }
}

fn default_followup_enabled() -> bool {
    true
}

fn default_followup_delay_secs() -> u64 {
    14_400
}

fn default_followup_min_severity() -> Severity {
    Severity::Medium
}

fn default_min_session_secs() -> u64 {
    60
}

fn default_max_session_secs() -> u64 {
    7_200
}

fn default_recent_window_secs() -> u64 {
    86_400
}

fn default_reply_window_secs() -> u64 {
    3_600
}

/// Console transport configuration (local end-to-end operation).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Channel id attributed to console messages.
    #[serde(default = "default_console_channel")]
    pub channel_id: String,

    /// User ids treated as response-team members on the console.
    #[serde(default)]
    pub team_users: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            channel_id: default_console_channel(),
            team_users: Vec::new(),
        }
    }
}

fn default_console_channel() -> String {
    "console".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_complete() {
        let config = VigilConfig::default();
        assert_eq!(config.agent.name, "ash");
        assert_eq!(config.alerts.min_severity, Severity::Medium);
        assert_eq!(config.alerts.cooldown_secs, 600);
        assert_eq!(config.escalation.delay_secs, 300);
        assert_eq!(config.session.idle_timeout_secs, 300);
        assert_eq!(config.session.max_duration_secs, 1800);
        assert_eq!(config.followup.min_severity, Severity::Medium);
    }

    #[test]
    fn severity_fields_parse_from_toml() {
        let toml_str = r#"
[alerts]
min_severity = "high"

[escalation]
min_severity = "critical"
"#;
        let config: VigilConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.alerts.min_severity, Severity::High);
        assert_eq!(config.escalation.min_severity, Severity::Critical);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml_str = r#"
[session]
idle_timeout_secs = 120
idle_tiemout_secs = 240
"#;
        let result = toml::from_str::<VigilConfig>(toml_str);
        assert!(result.is_err(), "typo'd key should be rejected");
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let toml_str = r#"
[followup]
delay_secs = 3600
"#;
        let config: VigilConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.followup.delay_secs, 3600);
        assert_eq!(config.followup.min_session_secs, 60);
        assert!(config.followup.enabled);
    }

    #[test]
    fn handoff_roles_default_nonempty() {
        let config = VigilConfig::default();
        assert_eq!(config.session.handoff_roles, vec!["crisis-response"]);
    }
}
