// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-zero windows and ordered duration bands.

use crate::diagnostic::ConfigError;
use crate::model::VigilConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &VigilConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.classifier.base_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "classifier.base_url must not be empty".to_string(),
        });
    }

    if config.classifier.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "classifier.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.classifier.breaker_failure_threshold == 0 {
        errors.push(ConfigError::Validation {
            message: "classifier.breaker_failure_threshold must be at least 1".to_string(),
        });
    }

    if config.classifier.breaker_open_max_secs < config.classifier.breaker_open_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "classifier.breaker_open_max_secs ({}) must be >= breaker_open_secs ({})",
                config.classifier.breaker_open_max_secs, config.classifier.breaker_open_secs
            ),
        });
    }

    if config.alerts.cooldown_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "alerts.cooldown_secs must be at least 1".to_string(),
        });
    }

    if config.escalation.delay_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "escalation.delay_secs must be at least 1".to_string(),
        });
    }

    if config.session.idle_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "session.idle_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.session.max_duration_secs < config.session.idle_timeout_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "session.max_duration_secs ({}) must be >= idle_timeout_secs ({})",
                config.session.max_duration_secs, config.session.idle_timeout_secs
            ),
        });
    }

    if config.followup.max_session_secs < config.followup.min_session_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "followup.max_session_secs ({}) must be >= min_session_secs ({})",
                config.followup.max_session_secs, config.followup.min_session_secs
            ),
        });
    }

    if config.followup.delay_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "followup.delay_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
