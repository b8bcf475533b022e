// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable deadline timers.
//!
//! Every armed timer is persisted before its in-process task is spawned;
//! the task is just a wake-up mechanism. On restart, [`TimerService::recover`]
//! re-derives outstanding deadlines from the store: overdue rows fire
//! immediately, future rows resume waiting for the remaining duration.
//!
//! Cancellation is cooperative and resolved at the store: firing claims the
//! row with a compare-and-set, so a timer that was cancelled (or already
//! fired) becomes a no-op no matter how late its task wakes up.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_core::{CrisisStore, TimerKind, TimerRecord, TimerStatus, VigilError};

use crate::EngineSignal;

/// Arms, cancels, recovers, and claims durable timers.
pub struct TimerService {
    store: Arc<dyn CrisisStore>,
    signals: mpsc::UnboundedSender<EngineSignal>,
    tasks: Mutex<HashMap<String, CancellationToken>>,
}

impl TimerService {
    pub fn new(store: Arc<dyn CrisisStore>, signals: mpsc::UnboundedSender<EngineSignal>) -> Self {
        Self {
            store,
            signals,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Persist a timer record and spawn its wake-up task.
    ///
    /// The store write happens first: if it fails, no task exists and the
    /// triggering action must fail with it, since an in-memory-only timer
    /// cannot survive a restart.
    pub async fn arm(
        &self,
        kind: TimerKind,
        entity_id: &str,
        fire_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<TimerRecord, VigilError> {
        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let record = TimerRecord {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            entity_id: entity_id.to_string(),
            fire_at: fire_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            status: TimerStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.create_timer(&record).await?;
        self.spawn_task(&record).await;

        debug!(
            timer_id = record.id.as_str(),
            kind = %kind,
            entity_id,
            fire_at = record.fire_at.as_str(),
            "timer armed"
        );
        Ok(record)
    }

    /// Cancel the pending timer of a given kind for an entity.
    ///
    /// Returns true if a pending row was cancelled; false means there was
    /// nothing to cancel (never armed, already fired, or already cancelled).
    pub async fn cancel(&self, kind: TimerKind, entity_id: &str) -> Result<bool, VigilError> {
        let Some(record) = self.store.pending_timer_for_entity(kind, entity_id).await? else {
            return Ok(false);
        };

        let cancelled = self
            .store
            .transition_timer(&record.id, TimerStatus::Pending, TimerStatus::Cancelled)
            .await?;

        if cancelled {
            if let Some(token) = self.tasks.lock().await.remove(&record.id) {
                token.cancel();
            }
            debug!(timer_id = record.id.as_str(), entity_id, "timer cancelled");
        }
        Ok(cancelled)
    }

    /// Claim a due timer before acting on it.
    ///
    /// The compare-and-set resolves the race with [`cancel`]: only one of
    /// the two wins, and a fire handler that lost must no-op.
    pub async fn claim(&self, timer_id: &str) -> Result<bool, VigilError> {
        let claimed = self
            .store
            .transition_timer(timer_id, TimerStatus::Pending, TimerStatus::Completed)
            .await?;
        self.tasks.lock().await.remove(timer_id);
        Ok(claimed)
    }

    /// Rebuild wake-up tasks from persisted pending rows after a restart.
    ///
    /// Overdue deadlines are signalled immediately -- a restart never loses
    /// an escalation. Returns how many rows were recovered.
    pub async fn recover(&self) -> Result<usize, VigilError> {
        let pending = self.store.pending_timers().await?;
        let count = pending.len();
        for record in &pending {
            self.spawn_task(record).await;
        }
        if count > 0 {
            info!(count, "recovered pending timers from store");
        }
        Ok(count)
    }

    async fn spawn_task(&self, record: &TimerRecord) {
        let token = CancellationToken::new();
        self.tasks
            .lock()
            .await
            .insert(record.id.clone(), token.clone());

        let remaining = match chrono::DateTime::parse_from_rfc3339(&record.fire_at) {
            Ok(fire_at) => (fire_at.with_timezone(&Utc) - Utc::now())
                .to_std()
                .unwrap_or_default(),
            Err(e) => {
                warn!(
                    timer_id = record.id.as_str(),
                    error = %e,
                    "unparseable fire_at, firing immediately"
                );
                std::time::Duration::ZERO
            }
        };

        let signals = self.signals.clone();
        let timer_id = record.id.clone();
        let kind = record.kind;
        let entity_id = record.entity_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(remaining) => {
                    // The receiver side claims the row; a send failure just
                    // means the engine is shutting down.
                    let _ = signals.send(EngineSignal::TimerDue {
                        timer_id,
                        kind,
                        entity_id,
                    });
                }
            }
        });
    }
}
