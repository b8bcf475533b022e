// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent store trait for alerts, sessions, follow-ups, timers,
//! cooldowns, and user preferences.
//!
//! Every mutable entity has a single authoritative status field, and every
//! status change goes through a compare-and-transition method that reports
//! whether the caller won the race. Timer handlers that lose are no-ops.

use async_trait::async_trait;

use crate::error::VigilError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Alert, AlertStatus, AshSession, CooldownEntry, EndReason, EngineCounts, FollowupStatus,
    MessageRef, ScheduledFollowup, SessionMessage, SessionStatus, TimerKind, TimerRecord,
    TimerStatus,
};

/// Adapter for the persistent key-value/relational store.
///
/// Process-local memory is never the durability source: armed timers and
/// entity status all round-trip through this trait.
#[async_trait]
pub trait CrisisStore: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), VigilError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), VigilError>;

    // --- Alert operations ---

    async fn create_alert(&self, alert: &Alert) -> Result<(), VigilError>;

    async fn get_alert(&self, id: &str) -> Result<Option<Alert>, VigilError>;

    /// The at-most-one alert in status `created` for a user, if any.
    async fn active_alert_for_user(&self, user_id: &str) -> Result<Option<Alert>, VigilError>;

    /// Compare-and-transition: moves the alert from `from` to `to` and
    /// returns true only if the alert was still in `from`.
    async fn transition_alert(
        &self,
        id: &str,
        from: AlertStatus,
        to: AlertStatus,
        actor: Option<&str>,
    ) -> Result<bool, VigilError>;

    /// Records the transport reference of the posted alert message.
    async fn set_alert_post_ref(&self, id: &str, post: &MessageRef) -> Result<(), VigilError>;

    // --- Session operations ---

    async fn create_session(&self, session: &AshSession) -> Result<(), VigilError>;

    async fn get_session(&self, id: &str) -> Result<Option<AshSession>, VigilError>;

    /// The at-most-one session in a non-terminal status for a user, if any.
    async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<AshSession>, VigilError>;

    async fn sessions_in_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<AshSession>, VigilError>;

    /// Refreshes the last-activity timestamp of an active session.
    async fn touch_session_activity(&self, id: &str, at: &str) -> Result<(), VigilError>;

    /// Compare-and-transition over any of the `from` statuses. `reason` and
    /// `actor` are written on terminal transitions.
    async fn transition_session(
        &self,
        id: &str,
        from: &[SessionStatus],
        to: SessionStatus,
        reason: Option<EndReason>,
        actor: Option<&str>,
    ) -> Result<bool, VigilError>;

    async fn append_session_message(&self, message: &SessionMessage) -> Result<(), VigilError>;

    async fn session_messages(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SessionMessage>, VigilError>;

    // --- Follow-up operations ---

    async fn create_followup(&self, followup: &ScheduledFollowup) -> Result<(), VigilError>;

    async fn get_followup(&self, id: &str) -> Result<Option<ScheduledFollowup>, VigilError>;

    async fn pending_followup_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<ScheduledFollowup>, VigilError>;

    /// Most recent follow-up for a user in any status, for cross-session
    /// rate limiting.
    async fn latest_followup_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<ScheduledFollowup>, VigilError>;

    /// A `sent` follow-up whose sent_at is at or after `since`, used to
    /// correlate a user reply back to the check-in that prompted it.
    async fn sent_followup_for_user_since(
        &self,
        user_id: &str,
        since: &str,
    ) -> Result<Option<ScheduledFollowup>, VigilError>;

    async fn transition_followup(
        &self,
        id: &str,
        from: FollowupStatus,
        to: FollowupStatus,
    ) -> Result<bool, VigilError>;

    // --- Cooldown operations ---

    async fn get_cooldown(&self, user_id: &str) -> Result<Option<CooldownEntry>, VigilError>;

    async fn set_cooldown(&self, entry: &CooldownEntry) -> Result<(), VigilError>;

    async fn clear_cooldown(&self, user_id: &str) -> Result<(), VigilError>;

    /// Deletes entries expired as of `now`; returns how many were removed.
    async fn sweep_cooldowns(&self, now: &str) -> Result<u64, VigilError>;

    // --- Timer operations ---

    async fn create_timer(&self, timer: &TimerRecord) -> Result<(), VigilError>;

    async fn pending_timers(&self) -> Result<Vec<TimerRecord>, VigilError>;

    async fn pending_timer_for_entity(
        &self,
        kind: TimerKind,
        entity_id: &str,
    ) -> Result<Option<TimerRecord>, VigilError>;

    async fn transition_timer(
        &self,
        id: &str,
        from: TimerStatus,
        to: TimerStatus,
    ) -> Result<bool, VigilError>;

    // --- User preferences ---

    /// Read-through opt-out check. Consulted at the moment of every contact
    /// decision, never cached across a suspension point.
    async fn is_opted_out(&self, user_id: &str) -> Result<bool, VigilError>;

    async fn set_opt_out(&self, user_id: &str, opted_out: bool) -> Result<(), VigilError>;

    // --- Aggregates ---

    async fn engine_counts(&self) -> Result<EngineCounts, VigilError>;
}
