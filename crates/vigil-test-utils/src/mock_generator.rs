// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted reply generator for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use vigil_core::types::ReplyContext;
use vigil_core::{AdapterType, HealthStatus, PluginAdapter, ReplyGenerator, VigilError};

/// Mock generator returning scripted replies, then a fixed default.
pub struct MockGenerator {
    scripted: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<ReplyContext>>,
    fail: AtomicBool,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            scripted: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Make subsequent generation calls fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Contexts the engine asked replies for, in order.
    pub async fn calls(&self) -> Vec<ReplyContext> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
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
impl ReplyGenerator for MockGenerator {
    async fn generate_reply(&self, ctx: &ReplyContext) -> Result<String, VigilError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VigilError::Generator {
                message: "mock generation failure".into(),
                source: None,
            });
        }
        self.calls.lock().await.push(ctx.clone());
        let scripted = self.scripted.lock().await.pop_front();
        Ok(scripted.unwrap_or_else(|| "I'm here with you. Do you want to talk about it?".into()))
    }
}
