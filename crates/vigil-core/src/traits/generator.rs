// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply generator trait: the black-box AI text-generation capability.

use async_trait::async_trait;

use crate::error::VigilError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ReplyContext;

/// Adapter producing conversational replies for Ash sessions.
///
/// The engine treats generation as opaque: it supplies the session context
/// and sends whatever text comes back, subject to its own opt-out and
/// lifecycle checks.
#[async_trait]
pub trait ReplyGenerator: PluginAdapter {
    /// Generates the next reply for the given session context.
    async fn generate_reply(&self, ctx: &ReplyContext) -> Result<String, VigilError>;
}
