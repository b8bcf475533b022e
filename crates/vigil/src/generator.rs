// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in template reply generator.
//!
//! The real AI text-generation capability is an external collaborator; this
//! stand-in keeps local operation self-contained. It rotates over a small
//! table of supportive lines per phase, keyed by session id, the same way
//! check-in variants rotate.

use async_trait::async_trait;

use vigil_core::types::{ReplyContext, ReplyPhase};
use vigil_core::{AdapterType, HealthStatus, PluginAdapter, ReplyGenerator, VigilError};
use vigil_engine::messages::pick_variant;

const OPENING_VARIANTS: &[&str] = &[
    "Hi, I'm Ash. Someone on the team thought you might be having a hard time right now, \
     and I wanted to reach out. Would you like to talk?",
    "Hey, I'm Ash. I noticed things might be heavy for you at the moment. I'm here if you \
     want to talk -- no pressure at all.",
    "Hi, Ash here. I wanted to check in with you. If you feel up to it, I'm listening.",
];

const REPLY_VARIANTS: &[&str] = &[
    "That sounds really hard. I'm here with you -- do you want to tell me more?",
    "Thank you for sharing that with me. What's weighing on you most right now?",
    "I hear you. You don't have to carry this alone. What would help most right now?",
];

/// Template-based reply generator.
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for TemplateGenerator {
    fn name(&self) -> &str {
        "template"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }

    async fn health_check(&self) -> Result<HealthStatus, VigilError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), VigilError> {
        Ok(())
    }
}

#[async_trait]
impl ReplyGenerator for TemplateGenerator {
    async fn generate_reply(&self, ctx: &ReplyContext) -> Result<String, VigilError> {
        let variants = match ctx.phase {
            ReplyPhase::Opening => OPENING_VARIANTS,
            ReplyPhase::Reply => REPLY_VARIANTS,
        };
        // Vary by turn as well as session so consecutive replies differ.
        let key = format!("{}:{}", ctx.session_id, ctx.transcript.len());
        Ok(pick_variant(&key, variants).to_string())
    }
}
