// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooldown-guarded alert dispatcher.
//!
//! Turns a scored classification into a persisted, deduplicated alert and
//! posts it to the severity-routed destination with its interactive
//! affordances. The persisted alert id is the binding for those
//! affordances, so they remain actionable after a process restart.
//!
//! Ordering matters: the alert row is persisted (and the auto-initiate
//! timer armed by the caller) before anything externally visible happens.
//! A persistence failure therefore fails the dispatch outright rather than
//! leaving an unpersisted alert or an orphaned timer behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use vigil_config::model::AlertConfig;
use vigil_core::types::AlertPost;
use vigil_core::{
    Alert, AlertStatus, ChatTransport, Classification, ClassificationResult, CrisisStore,
    Severity, VigilError,
};

use crate::cooldown::CooldownGuard;
use crate::recording;

/// Outcome of a dispatch attempt. Everything but `Dispatched` is a defined
/// no-op, not an error.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Alert persisted; the caller arms escalation and then posts it.
    Dispatched(Alert),
    /// Severity below the configured alert threshold.
    BelowThreshold,
    /// The user is inside an active cooldown window.
    OnCooldown,
    /// The user already has an unresolved alert; merged, not duplicated.
    AlreadyActive,
    /// Degraded classification: no alert may ever come from one.
    Degraded,
}

/// Cooldown-guarded alert dispatcher.
pub struct AlertDispatcher {
    store: Arc<dyn CrisisStore>,
    transport: Arc<dyn ChatTransport>,
    cooldown: CooldownGuard,
    config: AlertConfig,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn CrisisStore>,
        transport: Arc<dyn ChatTransport>,
        config: AlertConfig,
    ) -> Self {
        let cooldown = CooldownGuard::new(store.clone());
        Self {
            store,
            transport,
            cooldown,
            config,
        }
    }

    pub fn cooldown(&self) -> &CooldownGuard {
        &self.cooldown
    }

    /// Evaluate a classification and, if it qualifies, create and persist
    /// an alert and start the user's cooldown.
    ///
    /// Posting to the destination channel is a separate step ([`post`])
    /// so the caller can durably arm the escalation timer in between.
    pub async fn dispatch(
        &self,
        classification: &Classification,
        user_id: &str,
        channel_id: &str,
        message_id: &str,
    ) -> Result<DispatchOutcome, VigilError> {
        let result = match classification {
            Classification::Scored(result) => result,
            Classification::Degraded { reason } => {
                debug!(user_id, reason, "degraded classification, no dispatch");
                return Ok(DispatchOutcome::Degraded);
            }
        };

        if result.severity < self.config.min_severity {
            return Ok(DispatchOutcome::BelowThreshold);
        }

        if self.cooldown.is_on_cooldown(user_id).await? {
            debug!(user_id, "on cooldown, suppressing alert");
            return Ok(DispatchOutcome::OnCooldown);
        }

        if self.store.active_alert_for_user(user_id).await?.is_some() {
            debug!(user_id, "unresolved alert exists, merging");
            return Ok(DispatchOutcome::AlreadyActive);
        }

        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: message_id.to_string(),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            severity: result.severity,
            status: AlertStatus::Created,
            acknowledged_by: None,
            post_ref: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.create_alert(&alert).await?;

        self.cooldown
            .set_cooldown(user_id, Duration::from_secs(self.config.cooldown_secs))
            .await?;

        recording::record_alert_created(alert.severity);
        info!(
            alert_id = alert.id.as_str(),
            user_id,
            severity = %alert.severity,
            "alert created"
        );

        Ok(DispatchOutcome::Dispatched(alert))
    }

    /// Post a persisted alert to its severity-routed destination with the
    /// acknowledge / initiate-now affordances.
    ///
    /// The alert already exists durably; a transport failure here is logged
    /// and swallowed so escalation still covers the user.
    pub async fn post(&self, alert: &Alert, result: &ClassificationResult) {
        let destination = destination_for(&self.config, alert.severity);
        let broadcast = alert.severity >= self.config.broadcast_min_severity;

        let mut summary = format!(
            "Crisis alert for <@{}> in <#{}> -- severity {}",
            alert.user_id, alert.channel_id, alert.severity
        );
        if !result.categories.is_empty() {
            summary.push_str(&format!(" [{}]", result.categories.join(", ")));
        }
        if !result.rationale.is_empty() {
            summary.push_str(&format!("\n{}", result.rationale));
        }
        if broadcast {
            summary = format!("{} {summary}", self.config.team_mention);
        }

        let post = AlertPost {
            alert_id: alert.id.clone(),
            channel_id: destination.to_string(),
            severity: alert.severity,
            user_id: alert.user_id.clone(),
            context_id: alert.channel_id.clone(),
            summary,
            broadcast,
            needs_review: result.needs_review,
        };

        match self.transport.post_alert(&post).await {
            Ok(message_ref) => {
                if let Err(e) = self.store.set_alert_post_ref(&alert.id, &message_ref).await {
                    warn!(alert_id = alert.id.as_str(), error = %e, "failed to record post ref");
                }
            }
            Err(e) => {
                // The alert row and timer are durable; auto-initiate still
                // covers the user even though the team never saw the post.
                warn!(alert_id = alert.id.as_str(), error = %e, "failed to post alert");
            }
        }
    }

    /// Acknowledge an alert. Returns true if this call won the transition;
    /// false means the alert was already resolved (acknowledged, expired,
    /// or auto-initiated) and the acknowledgment is a no-op.
    pub async fn acknowledge(&self, alert_id: &str, actor: &str) -> Result<bool, VigilError> {
        let won = self
            .store
            .transition_alert(
                alert_id,
                AlertStatus::Created,
                AlertStatus::Acknowledged,
                Some(actor),
            )
            .await?;

        if won {
            recording::record_alert_acknowledged();
            info!(alert_id, actor, "alert acknowledged");
            self.update_post(alert_id, &format!("Acknowledged by <@{actor}>."))
                .await;
        } else {
            debug!(alert_id, actor, "acknowledgment lost the race, no-op");
        }
        Ok(won)
    }

    /// Append a status line to the alert's posted embed, if one exists.
    pub async fn update_post(&self, alert_id: &str, line: &str) {
        let alert = match self.store.get_alert(alert_id).await {
            Ok(Some(alert)) => alert,
            Ok(None) => return,
            Err(e) => {
                warn!(alert_id, error = %e, "failed to load alert for post update");
                return;
            }
        };
        let Some(post_ref) = alert.post_ref else {
            return;
        };
        let destination = destination_for(&self.config, alert.severity);
        if let Err(e) = self
            .transport
            .update_alert_post(
                destination,
                &vigil_core::MessageRef(post_ref),
                line,
            )
            .await
        {
            warn!(alert_id, error = %e, "failed to update alert post");
        }
    }
}

/// Destination channel for a severity tier.
pub fn destination_for(config: &AlertConfig, severity: Severity) -> &str {
    match severity {
        Severity::None | Severity::Low => &config.channel_low,
        Severity::Medium => &config.channel_medium,
        Severity::High => &config.channel_high,
        Severity::Critical => &config.channel_critical,
    }
}
