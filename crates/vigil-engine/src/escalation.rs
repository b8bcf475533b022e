// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-initiate escalation scheduler.
//!
//! Ensures no at-risk user is left without any response when the human team
//! is slow or unavailable. Each dispatched alert arms a durable timer; a
//! human acknowledgment cancels it, and an expiring timer re-checks
//! eligibility at the moment of firing -- user state can change during the
//! wait -- before starting automatic AI contact.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use vigil_config::model::EscalationConfig;
use vigil_core::{
    Alert, AlertStatus, CrisisStore, SessionTrigger, TimerKind, TimerRecord, VigilError,
};

use crate::dispatcher::AlertDispatcher;
use crate::recording;
use crate::session::{SessionEngine, StartOutcome};
use crate::timers::TimerService;

/// Watches dispatched alerts for human inaction.
pub struct AutoInitiateScheduler {
    store: Arc<dyn CrisisStore>,
    timers: Arc<TimerService>,
    sessions: Arc<SessionEngine>,
    dispatcher: Arc<AlertDispatcher>,
    config: EscalationConfig,
}

impl AutoInitiateScheduler {
    pub fn new(
        store: Arc<dyn CrisisStore>,
        timers: Arc<TimerService>,
        sessions: Arc<SessionEngine>,
        dispatcher: Arc<AlertDispatcher>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            store,
            timers,
            sessions,
            dispatcher,
            config,
        }
    }

    /// Arm the escalation timer for a freshly dispatched alert.
    ///
    /// Eligibility is evaluated here and again at fire time. The timer row
    /// is persisted before this returns; a persistence failure propagates
    /// so the dispatch that requested arming fails with it.
    pub async fn arm(&self, alert: &Alert) -> Result<Option<TimerRecord>, VigilError> {
        if !self.config.enabled {
            return Ok(None);
        }
        if alert.severity < self.config.min_severity {
            debug!(
                alert_id = alert.id.as_str(),
                severity = %alert.severity,
                "severity below auto-initiate floor, not arming"
            );
            return Ok(None);
        }
        if self.store.is_opted_out(&alert.user_id).await? {
            debug!(alert_id = alert.id.as_str(), "user opted out, not arming");
            return Ok(None);
        }

        let fire_at = Utc::now() + chrono::Duration::seconds(self.config.delay_secs as i64);
        let record = self.timers.arm(TimerKind::AutoInitiate, &alert.id, fire_at).await?;
        Ok(Some(record))
    }

    /// Cancel the armed timer (human acknowledged or initiated manually).
    pub async fn cancel(&self, alert_id: &str) -> Result<bool, VigilError> {
        self.timers.cancel(TimerKind::AutoInitiate, alert_id).await
    }

    /// The timer fired: re-check everything, then start automatic contact.
    ///
    /// Checks run against current state, not arm-time state. An alert that
    /// was acknowledged in the meantime is a silent no-op; one whose user
    /// opted out or whose severity is no longer eligible expires with an
    /// auditable reason.
    pub async fn on_fire(&self, alert_id: &str) -> Result<(), VigilError> {
        let Some(alert) = self.store.get_alert(alert_id).await? else {
            warn!(alert_id, "fired timer references unknown alert");
            return Ok(());
        };

        if alert.status != AlertStatus::Created {
            debug!(alert_id, status = %alert.status, "alert already resolved, no-op");
            return Ok(());
        }

        let expire_reason = if alert.severity < self.config.min_severity {
            Some("severity_ineligible")
        } else if self.store.is_opted_out(&alert.user_id).await? {
            Some("opted_out")
        } else {
            None
        };

        if let Some(reason) = expire_reason {
            let won = self
                .store
                .transition_alert(alert_id, AlertStatus::Created, AlertStatus::Expired, None)
                .await?;
            if won {
                recording::record_alert_expired(reason);
                info!(alert_id, reason, "auto-initiate expired without contact");
            }
            return Ok(());
        }

        // Claim the alert before touching the user; an acknowledgment
        // racing us either wins here or not at all.
        let won = self
            .store
            .transition_alert(
                alert_id,
                AlertStatus::Created,
                AlertStatus::AutoInitiated,
                None,
            )
            .await?;
        if !won {
            debug!(alert_id, "lost auto-initiate race to acknowledgment");
            return Ok(());
        }

        recording::record_alert_auto_initiated();
        info!(alert_id, user_id = alert.user_id.as_str(), "auto-initiating contact");

        match self
            .sessions
            .start_contact(
                &alert.user_id,
                &alert.channel_id,
                alert.severity,
                SessionTrigger::AutoInitiated,
            )
            .await?
        {
            StartOutcome::Started(_) => {
                self.dispatcher
                    .update_post(
                        alert_id,
                        "No human response in time -- Ash reached out automatically.",
                    )
                    .await;
            }
            StartOutcome::AlreadyActive(session_id) => {
                debug!(alert_id, session_id = session_id.as_str(), "session already live");
            }
            StartOutcome::OptedOut => {
                // Preference flipped between our check and the session's own.
                info!(alert_id, "user opted out during auto-initiate");
            }
            StartOutcome::Failed(reason) => {
                warn!(alert_id, reason = reason.as_str(), "auto-initiated contact failed");
            }
        }
        Ok(())
    }
}
