// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory chat transport for tests.
//!
//! Tests inject inbound events and assert on captured outbound traffic.
//! DM delivery can be made to fail to exercise the never-half-started
//! session guarantee.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use vigil_core::types::{
    AlertPost, InboundMessage, InteractionAction, InteractionEvent, TransportEvent,
};
use vigil_core::{
    AdapterType, ChatTransport, HealthStatus, MessageRef, PluginAdapter, VigilError,
};

/// Captured outbound DM.
#[derive(Debug, Clone)]
pub struct SentDm {
    pub user_id: String,
    pub text: String,
}

/// Mock transport capturing everything the engine sends.
pub struct MockTransport {
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    dms: Mutex<Vec<SentDm>>,
    channel_messages: Mutex<Vec<(String, String)>>,
    alert_posts: Mutex<Vec<AlertPost>>,
    post_updates: Mutex<Vec<(String, String)>>,
    fail_dms: AtomicBool,
    next_ref: AtomicU64,
}

impl MockTransport {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events_rx: Mutex::new(events_rx),
            dms: Mutex::new(Vec::new()),
            channel_messages: Mutex::new(Vec::new()),
            alert_posts: Mutex::new(Vec::new()),
            post_updates: Mutex::new(Vec::new()),
            fail_dms: AtomicBool::new(false),
            next_ref: AtomicU64::new(1),
        }
    }

    /// Make subsequent DM sends fail.
    pub fn set_fail_dms(&self, fail: bool) {
        self.fail_dms.store(fail, Ordering::SeqCst);
    }

    /// Inject a channel message from a plain community member.
    pub fn inject_channel_message(&self, author_id: &str, channel_id: &str, text: &str) {
        self.inject(make_message(author_id, channel_id, text, &[], false));
    }

    /// Inject a channel message from a user holding the given roles.
    pub fn inject_team_message(
        &self,
        author_id: &str,
        channel_id: &str,
        text: &str,
        roles: &[&str],
    ) {
        self.inject(make_message(author_id, channel_id, text, roles, false));
    }

    /// Inject a DM to the agent.
    pub fn inject_dm(&self, author_id: &str, text: &str) {
        self.inject(make_message(author_id, "dm", text, &[], true));
    }

    /// Inject a button click on an alert post.
    pub fn inject_interaction(&self, actor_id: &str, alert_id: &str, action: InteractionAction) {
        let _ = self
            .events_tx
            .send(TransportEvent::Interaction(InteractionEvent {
                actor_id: actor_id.to_string(),
                alert_id: alert_id.to_string(),
                action,
            }));
    }

    fn inject(&self, message: InboundMessage) {
        let _ = self.events_tx.send(TransportEvent::Message(message));
    }

    pub async fn dms_to(&self, user_id: &str) -> Vec<String> {
        self.dms
            .lock()
            .await
            .iter()
            .filter(|dm| dm.user_id == user_id)
            .map(|dm| dm.text.clone())
            .collect()
    }

    pub async fn channel_messages(&self) -> Vec<(String, String)> {
        self.channel_messages.lock().await.clone()
    }

    pub async fn alert_posts(&self) -> Vec<AlertPost> {
        self.alert_posts.lock().await.clone()
    }

    pub async fn post_updates(&self) -> Vec<(String, String)> {
        self.post_updates.lock().await.clone()
    }

    fn next_ref(&self) -> MessageRef {
        MessageRef(format!("mock-{}", self.next_ref.fetch_add(1, Ordering::SeqCst)))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn make_message(
    author_id: &str,
    channel_id: &str,
    text: &str,
    roles: &[&str],
    is_dm: bool,
) -> InboundMessage {
    InboundMessage {
        message_id: uuid::Uuid::new_v4().to_string(),
        author_id: author_id.to_string(),
        channel_id: channel_id.to_string(),
        text: text.to_string(),
        author_roles: roles.iter().map(|r| r.to_string()).collect(),
        is_dm,
        timestamp: chrono::Utc::now(),
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VigilError> {
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn next_event(&self) -> Result<TransportEvent, VigilError> {
        let mut rx = self.events_rx.lock().await;
        rx.recv().await.ok_or_else(|| VigilError::Transport {
            message: "mock transport event channel closed".into(),
            source: None,
        })
    }

    async fn post_alert(&self, post: &AlertPost) -> Result<MessageRef, VigilError> {
        self.alert_posts.lock().await.push(post.clone());
        Ok(self.next_ref())
    }

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<MessageRef, VigilError> {
        if self.fail_dms.load(Ordering::SeqCst) {
            return Err(VigilError::Transport {
                message: format!("mock DM delivery to {user_id} failed"),
                source: None,
            });
        }
        self.dms.lock().await.push(SentDm {
            user_id: user_id.to_string(),
            text: text.to_string(),
        });
        Ok(self.next_ref())
    }

    async fn send_channel(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<MessageRef, VigilError> {
        self.channel_messages
            .lock()
            .await
            .push((channel_id.to_string(), text.to_string()));
        Ok(self.next_ref())
    }

    async fn update_alert_post(
        &self,
        _channel_id: &str,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), VigilError> {
        self.post_updates
            .lock()
            .await
            .push((message.0.clone(), text.to_string()));
        Ok(())
    }
}
