// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal transport adapter.
//!
//! Lets the engine run end-to-end without a platform gateway: stdin lines
//! become inbound events, outbound traffic prints to stdout. Intended for
//! local operation and demos; real platform gateways live outside this
//! repository.
//!
//! Line protocol:
//!
//! ```text
//! <user>: <text>          channel message from <user>
//! dm <user>: <text>       direct message from <user>
//! ack <alert-id> <user>   acknowledge button click
//! init <alert-id> <user>  initiate-now button click
//! ```

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use vigil_config::model::ConsoleConfig;
use vigil_core::types::{
    AlertPost, InboundMessage, InteractionAction, InteractionEvent, TransportEvent,
};
use vigil_core::{
    AdapterType, ChatTransport, HealthStatus, MessageRef, PluginAdapter, VigilError,
};

/// Console transport reading stdin and writing stdout.
pub struct ConsoleTransport {
    config: ConsoleConfig,
    inbound_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    inbound_tx: mpsc::Sender<TransportEvent>,
    reader_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ConsoleTransport {
    pub fn new(config: ConsoleConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(100);
        Self {
            config,
            inbound_rx: Mutex::new(inbound_rx),
            inbound_tx,
            reader_handle: Mutex::new(None),
        }
    }

    /// Start the stdin reader task. Idempotent.
    pub async fn connect(&self) {
        let mut handle = self.reader_handle.lock().await;
        if handle.is_some() {
            return;
        }

        let tx = self.inbound_tx.clone();
        let config = self.config.clone();
        info!("console transport reading stdin");
        *handle = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(event) = parse_line(&line, &config) else {
                            if !line.trim().is_empty() {
                                eprintln!("console: unparseable line: {line}");
                            }
                            continue;
                        };
                        if tx.send(event).await.is_err() {
                            warn!("inbound channel closed, stopping console reader");
                            return;
                        }
                    }
                    Ok(None) => {
                        debug!("stdin closed");
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read error");
                        return;
                    }
                }
            }
        }));
    }

    fn next_ref(&self) -> MessageRef {
        MessageRef(uuid::Uuid::new_v4().to_string())
    }
}

/// Parse a console line into a transport event.
fn parse_line(line: &str, config: &ConsoleConfig) -> Option<TransportEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("ack ") {
        return parse_interaction(rest, InteractionAction::Acknowledge);
    }
    if let Some(rest) = trimmed.strip_prefix("init ") {
        return parse_interaction(rest, InteractionAction::InitiateNow);
    }

    let (author, text, is_dm) = if let Some(rest) = trimmed.strip_prefix("dm ") {
        let (author, text) = rest.split_once(':')?;
        (author.trim(), text.trim(), true)
    } else {
        let (author, text) = trimmed.split_once(':')?;
        (author.trim(), text.trim(), false)
    };
    if author.is_empty() || text.is_empty() {
        return None;
    }

    let author_roles = if config.team_users.iter().any(|u| u == author) {
        vec!["crisis-response".to_string()]
    } else {
        Vec::new()
    };

    Some(TransportEvent::Message(InboundMessage {
        message_id: uuid::Uuid::new_v4().to_string(),
        author_id: author.to_string(),
        channel_id: if is_dm {
            "dm".to_string()
        } else {
            config.channel_id.clone()
        },
        text: text.to_string(),
        author_roles,
        is_dm,
        timestamp: chrono::Utc::now(),
    }))
}

fn parse_interaction(rest: &str, action: InteractionAction) -> Option<TransportEvent> {
    let mut parts = rest.split_whitespace();
    let alert_id = parts.next()?;
    let actor_id = parts.next()?;
    Some(TransportEvent::Interaction(InteractionEvent {
        actor_id: actor_id.to_string(),
        alert_id: alert_id.to_string(),
        action,
    }))
}

#[async_trait]
impl PluginAdapter for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
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
        if let Some(handle) = self.reader_handle.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn next_event(&self) -> Result<TransportEvent, VigilError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| VigilError::Transport {
            message: "console inbound channel closed".into(),
            source: None,
        })
    }

    async fn post_alert(&self, post: &AlertPost) -> Result<MessageRef, VigilError> {
        let broadcast = if post.broadcast { " [broadcast]" } else { "" };
        let review = if post.needs_review { " [needs review]" } else { "" };
        println!(
            "[#{}]{broadcast}{review} {} (alert {}; reply `ack {} <you>` or `init {} <you>`)",
            post.channel_id, post.summary, post.alert_id, post.alert_id, post.alert_id
        );
        Ok(self.next_ref())
    }

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<MessageRef, VigilError> {
        println!("[dm -> {user_id}] {text}");
        Ok(self.next_ref())
    }

    async fn send_channel(
        &self,
        channel_id: &str,
        text: &str,
    ) -> Result<MessageRef, VigilError> {
        println!("[#{channel_id}] {text}");
        Ok(self.next_ref())
    }

    async fn update_alert_post(
        &self,
        channel_id: &str,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), VigilError> {
        println!("[#{channel_id}] (update {}) {text}", message.0);
        Ok(())
    }
}
