// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Vigil crisis-response engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Vigil workspace. The chat transport,
//! reply generator, and persistent store are all consumed through traits
//! defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::VigilError;
pub use types::{
    AdapterType, Alert, AlertStatus, AshSession, Classification, ClassificationResult,
    CooldownEntry, EndReason, EngineCounts, FollowupStatus, HealthStatus, MessageRef,
    ScheduledFollowup, SessionMessage, SessionStatus, SessionTrigger, Severity, TimerKind,
    TimerRecord, TimerStatus,
};

// Re-export all adapter traits at crate root.
pub use traits::{ChatTransport, CrisisStore, PluginAdapter, ReplyGenerator};
