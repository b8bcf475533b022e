// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport trait for platform gateways (Discord-like, console, mock).

use async_trait::async_trait;

use crate::error::VigilError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AlertPost, MessageRef, TransportEvent};

/// Adapter for the chat platform the community lives on.
///
/// The transport delivers inbound message and interaction events and exposes
/// the handful of send operations the engine needs. Everything is keyed by
/// persisted ids so affordances survive a process restart.
#[async_trait]
pub trait ChatTransport: PluginAdapter {
    /// Waits for the next inbound event. Cancellation-safe: dropping the
    /// future must not lose events.
    async fn next_event(&self) -> Result<TransportEvent, VigilError>;

    /// Posts a routed alert with its acknowledge / initiate-now affordances
    /// bound to the alert id. Returns a reference usable for later updates.
    async fn post_alert(&self, post: &AlertPost) -> Result<MessageRef, VigilError>;

    /// Sends a direct message to a user. A successful return means the
    /// message was delivered to the platform, not merely queued locally.
    async fn send_dm(&self, user_id: &str, text: &str) -> Result<MessageRef, VigilError>;

    /// Sends a message to a channel (hand-off announcements).
    async fn send_channel(&self, channel_id: &str, text: &str)
        -> Result<MessageRef, VigilError>;

    /// Updates a previously posted alert message (e.g. to reflect that
    /// automatic contact occurred).
    async fn update_alert_post(
        &self,
        channel_id: &str,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), VigilError>;
}
