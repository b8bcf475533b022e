// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human hand-off detection.
//!
//! Watches channel activity for qualifying response-team members acting in
//! a context that has a live session. Detection pre-empts both session
//! timers: once a human is in the conversation, automated replies stop.

use std::sync::Arc;

use vigil_core::types::InboundMessage;
use vigil_core::{AshSession, CrisisStore, SessionStatus, VigilError};

/// Detects response-team activity that should hand a session to a human.
pub struct HandoffDetector {
    roles: Vec<String>,
}

impl HandoffDetector {
    pub fn new(roles: Vec<String>) -> Self {
        Self { roles }
    }

    /// Whether an author's roles qualify them to take over a session.
    pub fn qualifies(&self, author_roles: &[String]) -> bool {
        author_roles.iter().any(|r| self.roles.contains(r))
    }

    /// Returns the live session that this channel message hands off, if any.
    ///
    /// A message qualifies when its author holds a hand-off role, is not the
    /// session subject, and writes in the channel the session's alert came
    /// from.
    pub async fn detect(
        &self,
        store: &Arc<dyn CrisisStore>,
        message: &InboundMessage,
    ) -> Result<Option<AshSession>, VigilError> {
        if message.is_dm || !self.qualifies(&message.author_roles) {
            return Ok(None);
        }

        for status in [SessionStatus::Active, SessionStatus::IdlePending] {
            for session in store.sessions_in_status(status).await? {
                if session.channel_id == message.channel_id
                    && session.user_id != message.author_id
                {
                    return Ok(Some(session));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vigil_core::types::{SessionTrigger, Severity};
    use vigil_test_utils::open_test_store;

    fn team_message(author_id: &str, channel_id: &str, roles: &[&str]) -> InboundMessage {
        InboundMessage {
            message_id: "m1".to_string(),
            author_id: author_id.to_string(),
            channel_id: channel_id.to_string(),
            text: "I've got this one".to_string(),
            author_roles: roles.iter().map(|r| r.to_string()).collect(),
            is_dm: false,
            timestamp: Utc::now(),
        }
    }

    async fn seed_session(store: &Arc<dyn CrisisStore>, id: &str, user: &str, channel: &str) {
        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        store
            .create_session(&AshSession {
                id: id.to_string(),
                user_id: user.to_string(),
                channel_id: channel.to_string(),
                trigger_severity: Severity::High,
                trigger: SessionTrigger::AutoInitiated,
                status: SessionStatus::Active,
                end_reason: None,
                handoff_actor: None,
                started_at: now.clone(),
                last_activity_at: now,
                ended_at: None,
            })
            .await
            .unwrap();
    }

    #[test]
    fn role_matching() {
        let detector = HandoffDetector::new(vec!["crisis-response".to_string()]);
        assert!(detector.qualifies(&["crisis-response".to_string()]));
        assert!(detector.qualifies(&["member".to_string(), "crisis-response".to_string()]));
        assert!(!detector.qualifies(&["member".to_string()]));
        assert!(!detector.qualifies(&[]));
    }

    #[tokio::test]
    async fn detects_team_activity_in_session_channel() {
        let (store, _dir) = open_test_store().await;
        seed_session(&store, "s1", "subject-1", "chan-1").await;
        let detector = HandoffDetector::new(vec!["crisis-response".to_string()]);

        let hit = detector
            .detect(&store, &team_message("responder-1", "chan-1", &["crisis-response"]))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().id, "s1");
    }

    #[tokio::test]
    async fn ignores_other_channels_and_non_team_authors() {
        let (store, _dir) = open_test_store().await;
        seed_session(&store, "s1", "subject-1", "chan-1").await;
        let detector = HandoffDetector::new(vec!["crisis-response".to_string()]);

        // Wrong channel.
        assert!(
            detector
                .detect(&store, &team_message("responder-1", "chan-2", &["crisis-response"]))
                .await
                .unwrap()
                .is_none()
        );
        // Right channel, no qualifying role.
        assert!(
            detector
                .detect(&store, &team_message("bystander", "chan-1", &["member"]))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn subject_activity_is_not_a_handoff() {
        let (store, _dir) = open_test_store().await;
        seed_session(&store, "s1", "subject-1", "chan-1").await;
        // The subject somehow holds the role; their own messages must not
        // hand their session off.
        let detector = HandoffDetector::new(vec!["crisis-response".to_string()]);
        assert!(
            detector
                .detect(&store, &team_message("subject-1", "chan-1", &["crisis-response"]))
                .await
                .unwrap()
                .is_none()
        );
    }
}
