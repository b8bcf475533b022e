// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the CrisisStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use vigil_config::model::StorageConfig;
use vigil_core::types::{
    Alert, AlertStatus, AshSession, CooldownEntry, EngineCounts, FollowupStatus, MessageRef,
    ScheduledFollowup, SessionMessage, SessionStatus, TimerKind, TimerRecord, TimerStatus,
};
use vigil_core::{AdapterType, CrisisStore, EndReason, HealthStatus, PluginAdapter, VigilError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed crisis store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`CrisisStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until [`CrisisStore::initialize`]
    /// is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, VigilError> {
        self.db.get().ok_or_else(|| VigilError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VigilError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl CrisisStore for SqliteStore {
    async fn initialize(&self) -> Result<(), VigilError> {
        let path = self.config.database_path.clone();
        let db = Database::open(&path).await?;
        self.db.set(db).map_err(|_| VigilError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), VigilError> {
        self.db()?.close().await
    }

    // --- Alert operations ---

    async fn create_alert(&self, alert: &Alert) -> Result<(), VigilError> {
        queries::alerts::create_alert(self.db()?, alert).await
    }

    async fn get_alert(&self, id: &str) -> Result<Option<Alert>, VigilError> {
        queries::alerts::get_alert(self.db()?, id).await
    }

    async fn active_alert_for_user(&self, user_id: &str) -> Result<Option<Alert>, VigilError> {
        queries::alerts::active_alert_for_user(self.db()?, user_id).await
    }

    async fn transition_alert(
        &self,
        id: &str,
        from: AlertStatus,
        to: AlertStatus,
        actor: Option<&str>,
    ) -> Result<bool, VigilError> {
        queries::alerts::transition_alert(self.db()?, id, from, to, actor).await
    }

    async fn set_alert_post_ref(&self, id: &str, post: &MessageRef) -> Result<(), VigilError> {
        queries::alerts::set_alert_post_ref(self.db()?, id, post).await
    }

    // --- Session operations ---

    async fn create_session(&self, session: &AshSession) -> Result<(), VigilError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<AshSession>, VigilError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<AshSession>, VigilError> {
        queries::sessions::active_session_for_user(self.db()?, user_id).await
    }

    async fn sessions_in_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<AshSession>, VigilError> {
        queries::sessions::sessions_in_status(self.db()?, status).await
    }

    async fn touch_session_activity(&self, id: &str, at: &str) -> Result<(), VigilError> {
        queries::sessions::touch_session_activity(self.db()?, id, at).await
    }

    async fn transition_session(
        &self,
        id: &str,
        from: &[SessionStatus],
        to: SessionStatus,
        reason: Option<EndReason>,
        actor: Option<&str>,
    ) -> Result<bool, VigilError> {
        queries::sessions::transition_session(self.db()?, id, from, to, reason, actor).await
    }

    async fn append_session_message(&self, message: &SessionMessage) -> Result<(), VigilError> {
        queries::sessions::append_session_message(self.db()?, message).await
    }

    async fn session_messages(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<SessionMessage>, VigilError> {
        queries::sessions::session_messages(self.db()?, session_id, limit).await
    }

    // --- Follow-up operations ---

    async fn create_followup(&self, followup: &ScheduledFollowup) -> Result<(), VigilError> {
        queries::followups::create_followup(self.db()?, followup).await
    }

    async fn get_followup(&self, id: &str) -> Result<Option<ScheduledFollowup>, VigilError> {
        queries::followups::get_followup(self.db()?, id).await
    }

    async fn pending_followup_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<ScheduledFollowup>, VigilError> {
        queries::followups::pending_followup_for_user(self.db()?, user_id).await
    }

    async fn latest_followup_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<ScheduledFollowup>, VigilError> {
        queries::followups::latest_followup_for_user(self.db()?, user_id).await
    }

    async fn sent_followup_for_user_since(
        &self,
        user_id: &str,
        since: &str,
    ) -> Result<Option<ScheduledFollowup>, VigilError> {
        queries::followups::sent_followup_for_user_since(self.db()?, user_id, since).await
    }

    async fn transition_followup(
        &self,
        id: &str,
        from: FollowupStatus,
        to: FollowupStatus,
    ) -> Result<bool, VigilError> {
        queries::followups::transition_followup(self.db()?, id, from, to).await
    }

    // --- Cooldown operations ---

    async fn get_cooldown(&self, user_id: &str) -> Result<Option<CooldownEntry>, VigilError> {
        queries::cooldowns::get_cooldown(self.db()?, user_id).await
    }

    async fn set_cooldown(&self, entry: &CooldownEntry) -> Result<(), VigilError> {
        queries::cooldowns::set_cooldown(self.db()?, entry).await
    }

    async fn clear_cooldown(&self, user_id: &str) -> Result<(), VigilError> {
        queries::cooldowns::clear_cooldown(self.db()?, user_id).await
    }

    async fn sweep_cooldowns(&self, now: &str) -> Result<u64, VigilError> {
        queries::cooldowns::sweep_cooldowns(self.db()?, now).await
    }

    // --- Timer operations ---

    async fn create_timer(&self, timer: &TimerRecord) -> Result<(), VigilError> {
        queries::timers::create_timer(self.db()?, timer).await
    }

    async fn pending_timers(&self) -> Result<Vec<TimerRecord>, VigilError> {
        queries::timers::pending_timers(self.db()?).await
    }

    async fn pending_timer_for_entity(
        &self,
        kind: TimerKind,
        entity_id: &str,
    ) -> Result<Option<TimerRecord>, VigilError> {
        queries::timers::pending_timer_for_entity(self.db()?, kind, entity_id).await
    }

    async fn transition_timer(
        &self,
        id: &str,
        from: TimerStatus,
        to: TimerStatus,
    ) -> Result<bool, VigilError> {
        queries::timers::transition_timer(self.db()?, id, from, to).await
    }

    // --- User preferences ---

    async fn is_opted_out(&self, user_id: &str) -> Result<bool, VigilError> {
        queries::prefs::is_opted_out(self.db()?, user_id).await
    }

    async fn set_opt_out(&self, user_id: &str, opted_out: bool) -> Result<(), VigilError> {
        queries::prefs::set_opt_out(self.db()?, user_id, opted_out).await
    }

    // --- Aggregates ---

    async fn engine_counts(&self) -> Result<EngineCounts, VigilError> {
        self.db()?
            .connection()
            .call(|conn| {
                let open_alerts: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM alerts WHERE status = 'created'",
                    [],
                    |row| row.get(0),
                )?;
                let active_sessions: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sessions
                     WHERE status IN ('starting', 'active', 'idle_pending')",
                    [],
                    |row| row.get(0),
                )?;
                let pending_followups: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM followups WHERE status = 'pending'",
                    [],
                    |row| row.get(0),
                )?;
                let pending_timers: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM timers WHERE status = 'pending'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(EngineCounts {
                    open_alerts: open_alerts as u64,
                    active_sessions: active_sessions as u64,
                    pending_followups: pending_followups as u64,
                    pending_timers: pending_timers as u64,
                })
            })
            .await
            .map_err(crate::database::map_tr_err)
    }
}
