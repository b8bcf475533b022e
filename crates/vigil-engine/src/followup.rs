// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up check-in scheduler.
//!
//! After a session reaches a terminal state, decides whether and when to
//! send a privacy-respecting check-in, independent of alerting. Eligibility
//! is evaluated at scheduling time; opt-out is re-checked at fire time
//! because preference can change in between. Ineligibility at fire time is
//! recorded with an auditable status, never silently dropped.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use vigil_config::model::FollowupConfig;
use vigil_core::{
    AshSession, ChatTransport, CrisisStore, EndReason, FollowupStatus, ScheduledFollowup,
    TimerKind, VigilError,
};

use crate::messages;
use crate::recording;
use crate::timers::TimerService;

/// Schedules and delivers deferred check-ins.
pub struct FollowupScheduler {
    store: Arc<dyn CrisisStore>,
    transport: Arc<dyn ChatTransport>,
    timers: Arc<TimerService>,
    config: FollowupConfig,
}

impl FollowupScheduler {
    pub fn new(
        store: Arc<dyn CrisisStore>,
        transport: Arc<dyn ChatTransport>,
        timers: Arc<TimerService>,
        config: FollowupConfig,
    ) -> Self {
        Self {
            store,
            transport,
            timers,
            config,
        }
    }

    /// Evaluate a closed session and, if eligible, persist and arm a
    /// pending follow-up.
    pub async fn on_session_ended(
        &self,
        session: &AshSession,
    ) -> Result<Option<ScheduledFollowup>, VigilError> {
        if !self.config.enabled {
            return Ok(None);
        }

        if session.end_reason == Some(EndReason::OptedOut) {
            debug!(session_id = session.id.as_str(), "opted-out session, no follow-up");
            return Ok(None);
        }

        if session.trigger_severity < self.config.min_severity {
            debug!(
                session_id = session.id.as_str(),
                severity = %session.trigger_severity,
                "severity below follow-up floor"
            );
            return Ok(None);
        }

        let Some(ended_at) = session.ended_at.as_deref() else {
            debug!(session_id = session.id.as_str(), "session has no end timestamp");
            return Ok(None);
        };
        let Some(duration_secs) = span_secs(&session.started_at, ended_at) else {
            warn!(session_id = session.id.as_str(), "unparseable session timestamps");
            return Ok(None);
        };
        if duration_secs < self.config.min_session_secs
            || duration_secs > self.config.max_session_secs
        {
            debug!(
                session_id = session.id.as_str(),
                duration_secs,
                "session duration outside follow-up band"
            );
            return Ok(None);
        }

        if self
            .store
            .pending_followup_for_user(&session.user_id)
            .await?
            .is_some()
        {
            debug!(user_id = session.user_id.as_str(), "follow-up already pending");
            return Ok(None);
        }

        // Cross-session rate limit: any follow-up newer than the window,
        // whatever became of it, blocks another.
        if let Some(latest) = self.store.latest_followup_for_user(&session.user_id).await? {
            let window_start = (Utc::now()
                - chrono::Duration::seconds(self.config.recent_window_secs as i64))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            if latest.created_at >= window_start {
                debug!(
                    user_id = session.user_id.as_str(),
                    "recent follow-up exists, rate limiting"
                );
                return Ok(None);
            }
        }

        let ended = chrono::DateTime::parse_from_rfc3339(ended_at)
            .map_err(|e| VigilError::Internal(format!("bad ended_at: {e}")))?
            .with_timezone(&Utc);
        let fire_at = ended + chrono::Duration::seconds(self.config.delay_secs as i64);
        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let followup = ScheduledFollowup {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            severity: session.trigger_severity,
            fire_at: fire_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            status: FollowupStatus::Pending,
            sent_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.create_followup(&followup).await?;
        self.timers
            .arm(TimerKind::Followup, &followup.id, fire_at)
            .await?;

        recording::record_followup_scheduled();
        info!(
            followup_id = followup.id.as_str(),
            user_id = session.user_id.as_str(),
            fire_at = followup.fire_at.as_str(),
            "follow-up scheduled"
        );
        Ok(Some(followup))
    }

    /// The timer fired: re-check opt-out, then deliver one check-in variant.
    pub async fn on_fire(&self, followup_id: &str) -> Result<(), VigilError> {
        let Some(followup) = self.store.get_followup(followup_id).await? else {
            warn!(followup_id, "fired timer references unknown follow-up");
            return Ok(());
        };
        if followup.status != FollowupStatus::Pending {
            debug!(followup_id, status = %followup.status, "follow-up already resolved");
            return Ok(());
        }

        if self.store.is_opted_out(&followup.user_id).await? {
            let won = self
                .store
                .transition_followup(
                    followup_id,
                    FollowupStatus::Pending,
                    FollowupStatus::SkippedOptedOut,
                )
                .await?;
            if won {
                recording::record_followup_skipped("opted_out");
                info!(followup_id, "follow-up skipped: user opted out");
            }
            return Ok(());
        }

        let text = messages::pick_variant(followup_id, messages::CHECKIN_VARIANTS);
        if let Err(e) = self.transport.send_dm(&followup.user_id, text).await {
            warn!(followup_id, error = %e, "check-in delivery failed");
            let won = self
                .store
                .transition_followup(
                    followup_id,
                    FollowupStatus::Pending,
                    FollowupStatus::Cancelled,
                )
                .await?;
            if won {
                recording::record_followup_skipped("delivery_failed");
            }
            return Ok(());
        }

        let won = self
            .store
            .transition_followup(followup_id, FollowupStatus::Pending, FollowupStatus::Sent)
            .await?;
        if won {
            recording::record_followup_sent();
            info!(followup_id, user_id = followup.user_id.as_str(), "check-in sent");
        }
        Ok(())
    }

    /// Correlate a DM reply back to a recently sent check-in.
    pub async fn correlate_reply(
        &self,
        user_id: &str,
    ) -> Result<Option<ScheduledFollowup>, VigilError> {
        let since = (Utc::now() - chrono::Duration::seconds(self.config.reply_window_secs as i64))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.store.sent_followup_for_user_since(user_id, &since).await
    }
}

/// Seconds between two stored timestamps, if both parse.
fn span_secs(start: &str, end: &str) -> Option<u64> {
    let start = chrono::DateTime::parse_from_rfc3339(start).ok()?;
    let end = chrono::DateTime::parse_from_rfc3339(end).ok()?;
    let secs = (end - start).num_seconds();
    (secs >= 0).then_some(secs as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use vigil_core::types::{SessionStatus, SessionTrigger, Severity};
    use vigil_test_utils::{MockTransport, open_test_store};

    struct Fixture {
        scheduler: FollowupScheduler,
        store: Arc<dyn CrisisStore>,
        transport: Arc<MockTransport>,
        _rx: mpsc::UnboundedReceiver<crate::EngineSignal>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let (store, dir) = open_test_store().await;
        let transport = Arc::new(MockTransport::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = Arc::new(TimerService::new(store.clone(), tx));
        let scheduler = FollowupScheduler::new(
            store.clone(),
            transport.clone(),
            timers,
            FollowupConfig::default(),
        );
        Fixture {
            scheduler,
            store,
            transport,
            _rx: rx,
            _dir: dir,
        }
    }

    fn closed_session(
        id: &str,
        user_id: &str,
        severity: Severity,
        reason: EndReason,
        duration_secs: i64,
    ) -> AshSession {
        let ended = Utc::now();
        let started = ended - chrono::Duration::seconds(duration_secs);
        AshSession {
            id: id.to_string(),
            user_id: user_id.to_string(),
            channel_id: "chan-1".to_string(),
            trigger_severity: severity,
            trigger: SessionTrigger::AutoInitiated,
            status: SessionStatus::Ended,
            end_reason: Some(reason),
            handoff_actor: None,
            started_at: started.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            last_activity_at: ended.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            ended_at: Some(ended.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        }
    }

    #[tokio::test]
    async fn eligible_session_schedules_followup() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);

        let followup = f.scheduler.on_session_ended(&session).await.unwrap().unwrap();
        assert_eq!(followup.status, FollowupStatus::Pending);

        // Both the record and its durable timer exist.
        assert!(f.store.get_followup(&followup.id).await.unwrap().is_some());
        assert!(
            f.store
                .pending_timer_for_entity(TimerKind::Followup, &followup.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn opted_out_end_reason_schedules_nothing() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::High, EndReason::OptedOut, 600);
        assert!(f.scheduler.on_session_ended(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn severity_floor_applies() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::Low, EndReason::IdleTimeout, 600);
        assert!(f.scheduler.on_session_ended(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duration_band_excludes_short_and_long_sessions() {
        let f = fixture().await;
        // Too short (defaults: min 60s).
        let short = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 10);
        assert!(f.scheduler.on_session_ended(&short).await.unwrap().is_none());
        // Too long (defaults: max 7200s).
        let long = closed_session("s2", "user-1", Severity::High, EndReason::MaxDuration, 9000);
        assert!(f.scheduler.on_session_ended(&long).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pending_followup_blocks_another() {
        let f = fixture().await;
        let first = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        assert!(f.scheduler.on_session_ended(&first).await.unwrap().is_some());

        let second = closed_session("s2", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        assert!(f.scheduler.on_session_ended(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_followup_rate_limits_across_sessions() {
        let f = fixture().await;
        let first = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        let followup = f.scheduler.on_session_ended(&first).await.unwrap().unwrap();

        // Resolve it so no pending row remains; the recency window alone
        // must still block.
        f.store
            .transition_followup(&followup.id, FollowupStatus::Pending, FollowupStatus::Sent)
            .await
            .unwrap();

        let second = closed_session("s2", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        assert!(f.scheduler.on_session_ended(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fire_sends_checkin_and_marks_sent() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        let followup = f.scheduler.on_session_ended(&session).await.unwrap().unwrap();

        f.scheduler.on_fire(&followup.id).await.unwrap();

        let stored = f.store.get_followup(&followup.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FollowupStatus::Sent);
        assert!(stored.sent_at.is_some());

        let dms = f.transport.dms_to("user-1").await;
        assert_eq!(dms.len(), 1);
        assert!(
            messages::CHECKIN_VARIANTS.contains(&dms[0].as_str()),
            "check-in should be one of the pre-authored variants"
        );
    }

    #[tokio::test]
    async fn fire_skips_opted_out_user_with_auditable_status() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        let followup = f.scheduler.on_session_ended(&session).await.unwrap().unwrap();

        // Opt-out lands after scheduling, before firing.
        f.store.set_opt_out("user-1", true).await.unwrap();
        f.scheduler.on_fire(&followup.id).await.unwrap();

        let stored = f.store.get_followup(&followup.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FollowupStatus::SkippedOptedOut);
        assert!(f.transport.dms_to("user-1").await.is_empty());
    }

    #[tokio::test]
    async fn fire_twice_sends_once() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        let followup = f.scheduler.on_session_ended(&session).await.unwrap().unwrap();

        f.scheduler.on_fire(&followup.id).await.unwrap();
        f.scheduler.on_fire(&followup.id).await.unwrap();
        assert_eq!(f.transport.dms_to("user-1").await.len(), 1);
    }

    #[tokio::test]
    async fn reply_correlates_within_window_only() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        let followup = f.scheduler.on_session_ended(&session).await.unwrap().unwrap();
        f.scheduler.on_fire(&followup.id).await.unwrap();

        let hit = f.scheduler.correlate_reply("user-1").await.unwrap();
        assert_eq!(hit.unwrap().id, followup.id);

        assert!(f.scheduler.correlate_reply("someone-else").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delivery_failure_is_auditable_not_silent() {
        let f = fixture().await;
        let session = closed_session("s1", "user-1", Severity::High, EndReason::IdleTimeout, 600);
        let followup = f.scheduler.on_session_ended(&session).await.unwrap().unwrap();

        f.transport.set_fail_dms(true);
        f.scheduler.on_fire(&followup.id).await.unwrap();

        let stored = f.store.get_followup(&followup.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FollowupStatus::Cancelled);
    }
}
