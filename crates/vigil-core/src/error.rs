// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Vigil crisis-response engine.

use thiserror::Error;

/// The primary error type used across all Vigil adapter traits and core operations.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chat transport errors (delivery failure, message format, rate limiting).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Classifier service errors. `transient` marks failures worth retrying
    /// (timeouts, 5xx); validation-class failures are not retried.
    #[error("classifier error: {message}")]
    Classifier {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        transient: bool,
    },

    /// Reply generator errors (the AI text-generation capability).
    #[error("generator error: {message}")]
    Generator {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// An entity was not in the expected state for a transition. Callers on
    /// hot paths treat this as a defined no-op, not a failure.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Returns true for classifier failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, VigilError::Classifier { transient: true, .. })
    }
}
