// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crisis alert escalation and session engine.
//!
//! The [`CrisisEngine`] is the central coordinator: it receives transport
//! events, classifies channel messages through the resilient gateway,
//! dispatches cooldown-guarded alerts, arms durable escalation timers,
//! runs Ash conversation sessions with hand-off detection, and schedules
//! follow-up check-ins after sessions end.
//!
//! Concurrency model: one logical event-processing stream, plus detached
//! deadline tasks (escalation and follow-up timers, session supervisors)
//! that report back through a signal channel. All entity mutation happens
//! on the event stream via compare-and-transition, so a timer that lost a
//! race is always a no-op.

pub mod cooldown;
pub mod dispatcher;
pub mod escalation;
pub mod followup;
pub mod handoff;
pub mod messages;
pub mod recording;
pub mod session;
pub mod timers;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vigil_classifier::ClassificationGateway;
use vigil_config::VigilConfig;
use vigil_core::types::{InboundMessage, InteractionAction, InteractionEvent, TransportEvent};
use vigil_core::{
    AlertStatus, ChatTransport, Classification, CrisisStore, ReplyGenerator, SessionTrigger,
    TimerKind, VigilError,
};

use crate::dispatcher::{AlertDispatcher, DispatchOutcome};
use crate::escalation::AutoInitiateScheduler;
use crate::followup::FollowupScheduler;
use crate::handoff::HandoffDetector;
use crate::session::{MessageOutcome, SessionEngine, StartOutcome};
use crate::timers::TimerService;

/// Which of a session's two deadlines elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineKind {
    Idle,
    MaxDuration,
}

/// Wake-up messages from detached deadline tasks back to the engine loop.
#[derive(Debug)]
pub enum EngineSignal {
    /// A durable timer's deadline elapsed.
    TimerDue {
        timer_id: String,
        kind: TimerKind,
        entity_id: String,
    },
    /// A session supervisor's idle or max-duration deadline elapsed.
    SessionDeadline {
        session_id: String,
        which: DeadlineKind,
    },
}

/// The main engine coordinating classification, alerting, escalation,
/// sessions, and follow-ups.
pub struct CrisisEngine {
    store: Arc<dyn CrisisStore>,
    transport: Arc<dyn ChatTransport>,
    gateway: Arc<ClassificationGateway>,
    dispatcher: Arc<AlertDispatcher>,
    escalation: AutoInitiateScheduler,
    sessions: Arc<SessionEngine>,
    followups: Arc<FollowupScheduler>,
    timers: Arc<TimerService>,
    handoff: HandoffDetector,
    history_limit: usize,
    /// Recent channel messages fed to the classifier as context. In-memory
    /// only; context, not durable state.
    history: Mutex<HashMap<String, VecDeque<String>>>,
    /// Held so the signal channel never closes while the engine lives.
    _signals_tx: mpsc::UnboundedSender<EngineSignal>,
    signals_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineSignal>>>,
}

impl CrisisEngine {
    /// Wire up the engine from its adapters and configuration.
    pub fn new(
        config: VigilConfig,
        store: Arc<dyn CrisisStore>,
        transport: Arc<dyn ChatTransport>,
        generator: Arc<dyn ReplyGenerator>,
        gateway: Arc<ClassificationGateway>,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();

        let timers = Arc::new(TimerService::new(store.clone(), signals_tx.clone()));
        let sessions = Arc::new(SessionEngine::new(
            store.clone(),
            transport.clone(),
            generator,
            config.session.clone(),
            signals_tx.clone(),
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(
            store.clone(),
            transport.clone(),
            config.alerts.clone(),
        ));
        let escalation = AutoInitiateScheduler::new(
            store.clone(),
            timers.clone(),
            sessions.clone(),
            dispatcher.clone(),
            config.escalation.clone(),
        );
        let followups = Arc::new(FollowupScheduler::new(
            store.clone(),
            transport.clone(),
            timers.clone(),
            config.followup.clone(),
        ));
        let handoff = HandoffDetector::new(config.session.handoff_roles.clone());

        Self {
            store,
            transport,
            gateway,
            dispatcher,
            escalation,
            sessions,
            followups,
            timers,
            handoff,
            history_limit: config.classifier.history_limit,
            history: Mutex::new(HashMap::new()),
            _signals_tx: signals_tx,
            signals_rx: Mutex::new(Some(signals_rx)),
        }
    }

    /// Recovery sweep after startup: close sessions the previous process
    /// left live, re-arm persisted timers (overdue ones fire immediately),
    /// and reclaim expired cooldown rows.
    pub async fn recover(&self) -> Result<(), VigilError> {
        let closed = self.sessions.recover_interrupted().await?;
        for session in &closed {
            if let Err(e) = self.followups.on_session_ended(session).await {
                warn!(session_id = session.id.as_str(), error = %e, "follow-up evaluation failed");
            }
        }
        let timers = self.timers.recover().await?;
        let cooldowns = self.dispatcher.cooldown().sweep_expired().await?;
        info!(
            interrupted_sessions = closed.len(),
            recovered_timers = timers,
            swept_cooldowns = cooldowns,
            "recovery sweep complete"
        );
        Ok(())
    }

    /// Run the engine loop until the cancellation token fires or the
    /// transport closes.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), VigilError> {
        let mut signals = self
            .signals_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| VigilError::Internal("engine already running".into()))?;

        info!("crisis engine running");
        loop {
            tokio::select! {
                event = self.transport.next_event() => {
                    match event {
                        Ok(event) => {
                            if let Err(e) = self.handle_event(event).await {
                                error!(error = %e, "failed to handle transport event");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "transport closed, stopping engine");
                            break;
                        }
                    }
                }
                Some(signal) = signals.recv() => {
                    if let Err(e) = self.handle_signal(signal).await {
                        error!(error = %e, "failed to handle engine signal");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping engine");
                    break;
                }
            }
        }

        self.store.close().await?;
        info!("crisis engine stopped");
        Ok(())
    }

    async fn handle_event(&self, event: TransportEvent) -> Result<(), VigilError> {
        match event {
            TransportEvent::Message(message) => self.handle_message(message).await,
            TransportEvent::Interaction(interaction) => {
                self.handle_interaction(interaction).await
            }
        }
    }

    async fn handle_message(&self, message: InboundMessage) -> Result<(), VigilError> {
        if message.is_dm {
            return self.handle_dm(message).await;
        }

        // Hand-off detection pre-empts everything else for team activity.
        if let Some(session) = self.handoff.detect(&self.store, &message).await? {
            if self.sessions.hand_off(&session.id, &message.author_id).await? {
                self.after_session_closed(&session.id).await;
            }
            return Ok(());
        }

        let history = self.history_snapshot(&message.channel_id).await;
        let classification = self.gateway.classify(&message.text, &history).await;
        self.push_history(&message.channel_id, &message.text).await;

        match self
            .dispatcher
            .dispatch(
                &classification,
                &message.author_id,
                &message.channel_id,
                &message.message_id,
            )
            .await?
        {
            DispatchOutcome::Dispatched(alert) => {
                // The escalation timer must be durable before the alert
                // becomes visible; if arming fails, the alert is withdrawn
                // and the caller learns nothing was created.
                if let Err(e) = self.escalation.arm(&alert).await {
                    error!(
                        alert_id = alert.id.as_str(),
                        error = %e,
                        "failed to arm escalation, withdrawing alert"
                    );
                    let _ = self
                        .store
                        .transition_alert(
                            &alert.id,
                            AlertStatus::Created,
                            AlertStatus::Expired,
                            None,
                        )
                        .await;
                    let _ = self.dispatcher.cooldown().clear(&message.author_id).await;
                    return Err(e);
                }
                if let Classification::Scored(result) = &classification {
                    self.dispatcher.post(&alert, result).await;
                }
            }
            DispatchOutcome::BelowThreshold
            | DispatchOutcome::OnCooldown
            | DispatchOutcome::AlreadyActive
            | DispatchOutcome::Degraded => {}
        }
        Ok(())
    }

    async fn handle_dm(&self, message: InboundMessage) -> Result<(), VigilError> {
        if let Some(session) = self.store.active_session_for_user(&message.author_id).await? {
            let outcome = self
                .sessions
                .on_user_message(&session.id, &message.text)
                .await?;
            if let MessageOutcome::Ended(_) = outcome {
                self.after_session_closed(&session.id).await;
            }
            return Ok(());
        }

        if let Some(followup) = self.followups.correlate_reply(&message.author_id).await? {
            info!(
                user_id = message.author_id.as_str(),
                followup_id = followup.id.as_str(),
                "follow-up reply, starting continuation session"
            );
            let outcome = self
                .sessions
                .start_contact(
                    &message.author_id,
                    &message.channel_id,
                    followup.severity,
                    SessionTrigger::FollowupReply,
                )
                .await?;
            if let StartOutcome::Failed(reason) = outcome {
                warn!(
                    followup_id = followup.id.as_str(),
                    reason = reason.as_str(),
                    "continuation session failed to start"
                );
            }
            return Ok(());
        }

        debug!(author_id = message.author_id.as_str(), "unroutable DM ignored");
        Ok(())
    }

    async fn handle_interaction(&self, event: InteractionEvent) -> Result<(), VigilError> {
        match event.action {
            InteractionAction::Acknowledge => {
                if self
                    .dispatcher
                    .acknowledge(&event.alert_id, &event.actor_id)
                    .await?
                {
                    self.escalation.cancel(&event.alert_id).await?;
                }
            }
            InteractionAction::InitiateNow => {
                // Claiming the alert also cancels the escalation timer;
                // then contact starts with a manual trigger.
                if !self
                    .dispatcher
                    .acknowledge(&event.alert_id, &event.actor_id)
                    .await?
                {
                    debug!(alert_id = event.alert_id.as_str(), "initiate-now on resolved alert");
                    return Ok(());
                }
                self.escalation.cancel(&event.alert_id).await?;

                let Some(alert) = self.store.get_alert(&event.alert_id).await? else {
                    return Ok(());
                };
                let outcome = self
                    .sessions
                    .start_contact(
                        &alert.user_id,
                        &alert.channel_id,
                        alert.severity,
                        SessionTrigger::Manual,
                    )
                    .await?;
                if let StartOutcome::Started(_) = outcome {
                    self.dispatcher
                        .update_post(
                            &alert.id,
                            &format!("Contact initiated by <@{}>.", event.actor_id),
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn handle_signal(&self, signal: EngineSignal) -> Result<(), VigilError> {
        match signal {
            EngineSignal::TimerDue {
                timer_id,
                kind,
                entity_id,
            } => {
                // Claiming resolves the race with cancellation; losers no-op.
                if !self.timers.claim(&timer_id).await? {
                    debug!(timer_id = timer_id.as_str(), "due timer lost its claim, no-op");
                    return Ok(());
                }
                match kind {
                    TimerKind::AutoInitiate => self.escalation.on_fire(&entity_id).await?,
                    TimerKind::Followup => self.followups.on_fire(&entity_id).await?,
                }
            }
            EngineSignal::SessionDeadline { session_id, which } => {
                if self
                    .sessions
                    .handle_deadline(&session_id, which)
                    .await?
                    .is_some()
                {
                    self.after_session_closed(&session_id).await;
                }
            }
        }
        Ok(())
    }

    /// Every terminal session transition feeds the follow-up scheduler.
    async fn after_session_closed(&self, session_id: &str) {
        match self.store.get_session(session_id).await {
            Ok(Some(session)) => {
                if let Err(e) = self.followups.on_session_ended(&session).await {
                    warn!(session_id, error = %e, "follow-up evaluation failed");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(session_id, error = %e, "failed to load closed session"),
        }
    }

    async fn history_snapshot(&self, channel_id: &str) -> Vec<String> {
        self.history
            .lock()
            .await
            .get(channel_id)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn push_history(&self, channel_id: &str, text: &str) {
        let mut history = self.history.lock().await;
        let buffer = history.entry(channel_id.to_string()).or_default();
        buffer.push_back(text.to_string());
        while buffer.len() > self.history_limit {
            buffer.pop_front();
        }
    }
}
