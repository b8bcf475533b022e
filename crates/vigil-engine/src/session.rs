// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ash conversation session engine.
//!
//! Lifecycle: `starting` -> `active` -> `ended` or `handed_off`. A session
//! only becomes `active` once the opening DM is confirmed delivered; the
//! user never sees a half-started session.
//!
//! Two deadlines run against every active session: an idle window that
//! resets on each inbound message, and a hard max-duration ceiling. One
//! supervisor task owns both, waking at whichever comes first and
//! re-checking against the refreshed last-activity instant, so a message
//! arriving one tick before the idle deadline quietly extends it.
//!
//! Opt-out is a read-through check at every send, including the closing
//! message: preference can change mid-session, and a change wins instantly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_config::model::SessionConfig;
use vigil_core::types::{ReplyContext, ReplyPhase, TranscriptEntry};
use vigil_core::{
    AshSession, ChatTransport, CrisisStore, EndReason, ReplyGenerator, SessionMessage,
    SessionStatus, SessionTrigger, Severity, VigilError,
};

use crate::messages;
use crate::recording;
use crate::{DeadlineKind, EngineSignal};

/// Outcome of a contact attempt.
#[derive(Debug)]
pub enum StartOutcome {
    Started(AshSession),
    /// The user already has a live session; merged, not duplicated.
    AlreadyActive(String),
    /// The user has opted out of AI contact; no session is created.
    OptedOut,
    /// First contact failed; the session was closed without going active.
    Failed(String),
}

/// Outcome of routing an inbound DM into a session.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A reply went out.
    Replied,
    /// The message terminated the session.
    Ended(EndReason),
    /// Nothing happened (session not active, or a transient send failure).
    Skipped,
}

struct SessionHandle {
    cancel: CancellationToken,
    last_activity: Arc<std::sync::Mutex<Instant>>,
}

/// Manages the lifecycle of AI conversation sessions.
pub struct SessionEngine {
    store: Arc<dyn CrisisStore>,
    transport: Arc<dyn ChatTransport>,
    generator: Arc<dyn ReplyGenerator>,
    config: SessionConfig,
    signals: mpsc::UnboundedSender<EngineSignal>,
    runtime: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn CrisisStore>,
        transport: Arc<dyn ChatTransport>,
        generator: Arc<dyn ReplyGenerator>,
        config: SessionConfig,
        signals: mpsc::UnboundedSender<EngineSignal>,
    ) -> Self {
        Self {
            store,
            transport,
            generator,
            config,
            signals,
            runtime: Mutex::new(HashMap::new()),
        }
    }

    /// Begin AI contact with a user.
    ///
    /// Checks opt-out and the one-live-session invariant, creates the
    /// session record, and delivers the opening DM. Only a confirmed
    /// delivery marks the session `active`; any failure closes it with
    /// reason `start_failed` and the caller is told no session started.
    pub async fn start_contact(
        &self,
        user_id: &str,
        channel_id: &str,
        severity: Severity,
        trigger: SessionTrigger,
    ) -> Result<StartOutcome, VigilError> {
        if self.store.is_opted_out(user_id).await? {
            info!(user_id, %trigger, "user opted out, refusing to start session");
            return Ok(StartOutcome::OptedOut);
        }

        if let Some(existing) = self.store.active_session_for_user(user_id).await? {
            debug!(
                user_id,
                session_id = existing.id.as_str(),
                "live session exists, merging contact request"
            );
            return Ok(StartOutcome::AlreadyActive(existing.id));
        }

        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let session = AshSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            trigger_severity: severity,
            trigger,
            status: SessionStatus::Starting,
            end_reason: None,
            handoff_actor: None,
            started_at: now.clone(),
            last_activity_at: now,
            ended_at: None,
        };
        self.store.create_session(&session).await?;

        let ctx = ReplyContext {
            session_id: session.id.clone(),
            user_id: user_id.to_string(),
            trigger,
            phase: ReplyPhase::Opening,
            transcript: Vec::new(),
        };
        let opening = match self.generator.generate_reply(&ctx).await {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = session.id.as_str(), error = %e, "opening generation failed");
                self.close_unstarted(&session.id).await;
                return Ok(StartOutcome::Failed(format!("generation failed: {e}")));
            }
        };

        if let Err(e) = self.transport.send_dm(user_id, &opening).await {
            warn!(session_id = session.id.as_str(), error = %e, "opening DM failed");
            self.close_unstarted(&session.id).await;
            return Ok(StartOutcome::Failed(format!("delivery failed: {e}")));
        }

        self.append_transcript(&session.id, "assistant", &opening)
            .await;

        if !self
            .store
            .transition_session(
                &session.id,
                &[SessionStatus::Starting],
                SessionStatus::Active,
                None,
                None,
            )
            .await?
        {
            return Ok(StartOutcome::Failed("session no longer starting".into()));
        }

        self.spawn_supervisor(&session.id).await;
        recording::record_session_started(trigger);
        info!(
            session_id = session.id.as_str(),
            user_id,
            %trigger,
            severity = %severity,
            "session active"
        );

        let started = self
            .store
            .get_session(&session.id)
            .await?
            .ok_or_else(|| VigilError::Internal("session vanished after start".into()))?;
        Ok(StartOutcome::Started(started))
    }

    /// Route an inbound DM from the session subject.
    ///
    /// Refreshes the idle window, honors "stop", re-checks opt-out before
    /// the reply goes out, and otherwise generates and sends the next turn.
    pub async fn on_user_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<MessageOutcome, VigilError> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(MessageOutcome::Skipped);
        };
        if session.status != SessionStatus::Active {
            debug!(session_id, status = %session.status, "message for non-active session");
            return Ok(MessageOutcome::Skipped);
        }

        // Refresh both clocks: the persisted timestamp and the supervisor's
        // deadline instant.
        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.store.touch_session_activity(session_id, &now).await?;
        if let Some(handle) = self.runtime.lock().await.get(session_id) {
            *handle.last_activity.lock().unwrap() = Instant::now();
        }

        self.append_transcript(session_id, "user", text).await;

        if text.trim().eq_ignore_ascii_case("stop") {
            self.end_session(
                session_id,
                &[SessionStatus::Active],
                EndReason::UserEnded,
            )
            .await?;
            return Ok(MessageOutcome::Ended(EndReason::UserEnded));
        }

        let transcript = self
            .store
            .session_messages(session_id, Some(self.config.history_limit))
            .await?
            .into_iter()
            .map(|m| TranscriptEntry {
                role: m.role,
                content: m.content,
            })
            .collect();
        let ctx = ReplyContext {
            session_id: session_id.to_string(),
            user_id: session.user_id.clone(),
            trigger: session.trigger,
            phase: ReplyPhase::Reply,
            transcript,
        };
        let reply = match self.generator.generate_reply(&ctx).await {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id, error = %e, "reply generation failed");
                return Ok(MessageOutcome::Skipped);
            }
        };

        // Preference may have changed while we were generating; check at
        // the moment of action.
        if self.store.is_opted_out(&session.user_id).await? {
            info!(session_id, "user opted out mid-session, ending without reply");
            self.end_session(session_id, &[SessionStatus::Active], EndReason::OptedOut)
                .await?;
            return Ok(MessageOutcome::Ended(EndReason::OptedOut));
        }

        if let Err(e) = self.transport.send_dm(&session.user_id, &reply).await {
            warn!(session_id, error = %e, "reply delivery failed");
            return Ok(MessageOutcome::Skipped);
        }
        self.append_transcript(session_id, "assistant", &reply).await;

        Ok(MessageOutcome::Replied)
    }

    /// End a session from any of the `from` statuses. Returns true if this
    /// call won the terminal transition.
    pub async fn end_session(
        &self,
        session_id: &str,
        from: &[SessionStatus],
        reason: EndReason,
    ) -> Result<bool, VigilError> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(false);
        };

        let won = self
            .store
            .transition_session(session_id, from, SessionStatus::Ended, Some(reason), None)
            .await?;
        if !won {
            debug!(session_id, %reason, "terminal transition lost, no-op");
            return Ok(false);
        }

        self.drop_handle(session_id).await;
        self.send_closing(&session.user_id, reason).await;
        recording::record_session_ended(reason);
        info!(session_id, %reason, "session ended");
        Ok(true)
    }

    /// Hand the session to a human responder. Pre-empts both timers and
    /// suppresses all further automated replies.
    pub async fn hand_off(&self, session_id: &str, actor: &str) -> Result<bool, VigilError> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(false);
        };

        let won = self
            .store
            .transition_session(
                session_id,
                &[SessionStatus::Active, SessionStatus::IdlePending],
                SessionStatus::HandedOff,
                Some(EndReason::HandedOff),
                Some(actor),
            )
            .await?;
        if !won {
            debug!(session_id, actor, "hand-off lost the race, no-op");
            return Ok(false);
        }

        self.drop_handle(session_id).await;
        if let Err(e) = self
            .transport
            .send_channel(&session.channel_id, &messages::handoff_announcement(actor))
            .await
        {
            warn!(session_id, error = %e, "hand-off announcement failed");
        }
        recording::record_session_handed_off();
        info!(session_id, actor, "session handed off");
        Ok(true)
    }

    /// Act on a supervisor deadline. Returns the end reason if this call
    /// terminated the session; `None` means another transition won first.
    pub async fn handle_deadline(
        &self,
        session_id: &str,
        which: DeadlineKind,
    ) -> Result<Option<EndReason>, VigilError> {
        match which {
            DeadlineKind::MaxDuration => {
                let won = self
                    .end_session(
                        session_id,
                        &[SessionStatus::Active, SessionStatus::IdlePending],
                        EndReason::MaxDuration,
                    )
                    .await?;
                Ok(won.then_some(EndReason::MaxDuration))
            }
            DeadlineKind::Idle => {
                // Two-step: the idle_pending window lets a hand-off arriving
                // at the same instant win deterministically.
                let moved = self
                    .store
                    .transition_session(
                        session_id,
                        &[SessionStatus::Active],
                        SessionStatus::IdlePending,
                        None,
                        None,
                    )
                    .await?;
                if !moved {
                    return Ok(None);
                }
                let won = self
                    .end_session(
                        session_id,
                        &[SessionStatus::IdlePending],
                        EndReason::IdleTimeout,
                    )
                    .await?;
                Ok(won.then_some(EndReason::IdleTimeout))
            }
        }
    }

    /// Close sessions left live by an unclean shutdown. Returns the closed
    /// sessions so the caller can evaluate follow-up eligibility.
    pub async fn recover_interrupted(&self) -> Result<Vec<AshSession>, VigilError> {
        let mut closed = Vec::new();
        for status in [
            SessionStatus::Starting,
            SessionStatus::Active,
            SessionStatus::IdlePending,
        ] {
            for session in self.store.sessions_in_status(status).await? {
                let won = self
                    .store
                    .transition_session(
                        &session.id,
                        &[status],
                        SessionStatus::Ended,
                        Some(EndReason::Interrupted),
                        None,
                    )
                    .await?;
                if won {
                    recording::record_session_ended(EndReason::Interrupted);
                    if let Some(session) = self.store.get_session(&session.id).await? {
                        closed.push(session);
                    }
                }
            }
        }
        if !closed.is_empty() {
            info!(count = closed.len(), "closed interrupted sessions");
        }
        Ok(closed)
    }

    async fn close_unstarted(&self, session_id: &str) {
        if let Err(e) = self
            .store
            .transition_session(
                session_id,
                &[SessionStatus::Starting],
                SessionStatus::Ended,
                Some(EndReason::StartFailed),
                None,
            )
            .await
        {
            warn!(session_id, error = %e, "failed to close unstarted session");
        }
        recording::record_session_ended(EndReason::StartFailed);
    }

    /// Closing lines go through the same opt-out gate as every other send.
    async fn send_closing(&self, user_id: &str, reason: EndReason) {
        let Some(line) = messages::closing_line(reason) else {
            return;
        };
        match self.store.is_opted_out(user_id).await {
            Ok(false) => {
                if let Err(e) = self.transport.send_dm(user_id, line).await {
                    warn!(user_id, error = %e, "closing message failed");
                }
            }
            Ok(true) => debug!(user_id, "opted out, suppressing closing message"),
            Err(e) => warn!(user_id, error = %e, "opt-out check failed, suppressing closing"),
        }
    }

    async fn append_transcript(&self, session_id: &str, role: &str, content: &str) {
        let message = SessionMessage {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        // Transcript writes are best-effort; losing one degrades generator
        // context, not session correctness.
        if let Err(e) = self.store.append_session_message(&message).await {
            warn!(session_id, error = %e, "failed to persist transcript entry");
        }
    }

    async fn spawn_supervisor(&self, session_id: &str) {
        let cancel = CancellationToken::new();
        let last_activity = Arc::new(std::sync::Mutex::new(Instant::now()));
        {
            let mut runtime = self.runtime.lock().await;
            runtime.insert(
                session_id.to_string(),
                SessionHandle {
                    cancel: cancel.clone(),
                    last_activity: last_activity.clone(),
                },
            );
            recording::set_active_sessions(runtime.len() as f64);
        }

        let idle = Duration::from_secs(self.config.idle_timeout_secs);
        let max_deadline = Instant::now() + Duration::from_secs(self.config.max_duration_secs);
        let signals = self.signals.clone();
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            loop {
                let idle_deadline = *last_activity.lock().unwrap() + idle;
                let next = idle_deadline.min(max_deadline);
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep_until(next) => {
                        let now = Instant::now();
                        if now >= max_deadline {
                            let _ = signals.send(EngineSignal::SessionDeadline {
                                session_id,
                                which: DeadlineKind::MaxDuration,
                            });
                            return;
                        }
                        // An inbound message may have moved the idle deadline
                        // while we slept; only fire if it really elapsed.
                        if now >= *last_activity.lock().unwrap() + idle {
                            let _ = signals.send(EngineSignal::SessionDeadline {
                                session_id,
                                which: DeadlineKind::Idle,
                            });
                            return;
                        }
                    }
                }
            }
        });
    }

    async fn drop_handle(&self, session_id: &str) {
        let mut runtime = self.runtime.lock().await;
        if let Some(handle) = runtime.remove(session_id) {
            handle.cancel.cancel();
        }
        recording::set_active_sessions(runtime.len() as f64);
    }
}
