// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilient classification gateway for the Vigil crisis-response engine.
//!
//! Wraps the external semantic classifier behind a circuit breaker and
//! bounded retry with exponential backoff plus jitter. When the classifier
//! is unavailable the gateway degrades to silence rather than guessing:
//! a degraded result can never dispatch an alert.

pub mod breaker;
pub mod client;
pub mod gateway;
pub mod retry;
pub mod types;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use client::ClassifierClient;
pub use gateway::ClassificationGateway;
pub use retry::RetryPolicy;
