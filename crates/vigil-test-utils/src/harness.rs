// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete engine stack with mock transport and
//! generator, a temp SQLite database, and a classification gateway pointed
//! at whatever base URL the test provides (usually a wiremock server).
//! Inject events through the transport, then assert on the store and the
//! captured outbound traffic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use vigil_classifier::ClassificationGateway;
use vigil_config::VigilConfig;
use vigil_core::{CrisisStore, VigilError};
use vigil_engine::CrisisEngine;
use vigil_storage::SqliteStore;

use crate::mock_generator::MockGenerator;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: VigilConfig,
    replies: Vec<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: VigilConfig::default(),
            replies: Vec::new(),
        }
    }

    /// Point the gateway at a classifier endpoint (usually wiremock).
    pub fn with_classifier_url(mut self, base_url: &str) -> Self {
        self.config.classifier.base_url = base_url.to_string();
        self
    }

    /// Mutate the config before the stack is built.
    pub fn with_config(mut self, f: impl FnOnce(&mut VigilConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Script generator replies (opening first).
    pub fn with_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(mut self) -> Result<TestHarness, VigilError> {
        let temp = TempDir::new().map_err(|e| VigilError::Storage { source: e.into() })?;
        self.config.storage.database_path = temp
            .path()
            .join("harness.db")
            .to_string_lossy()
            .into_owned();

        let store = SqliteStore::new(self.config.storage.clone());
        store.initialize().await?;
        let store: Arc<dyn CrisisStore> = Arc::new(store);

        let transport = Arc::new(MockTransport::new());
        let generator = Arc::new(MockGenerator::with_replies(self.replies));
        let gateway = Arc::new(ClassificationGateway::new(&self.config.classifier)?);

        let engine = Arc::new(CrisisEngine::new(
            self.config.clone(),
            store.clone(),
            transport.clone(),
            generator.clone(),
            gateway,
        ));

        Ok(TestHarness {
            config: self.config,
            store,
            transport,
            generator,
            engine,
            cancel: CancellationToken::new(),
            _temp: temp,
        })
    }
}

/// A fully wired engine over mock adapters and a temp database.
pub struct TestHarness {
    pub config: VigilConfig,
    pub store: Arc<dyn CrisisStore>,
    pub transport: Arc<MockTransport>,
    pub generator: Arc<MockGenerator>,
    pub engine: Arc<CrisisEngine>,
    cancel: CancellationToken,
    _temp: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Run recovery and start the engine loop in the background.
    pub async fn spawn(&self) -> Result<(), VigilError> {
        self.engine.recover().await?;
        let engine = self.engine.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run(cancel).await {
                tracing::error!(error = %e, "harness engine loop exited with error");
            }
        });
        Ok(())
    }

    /// Stop the engine loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Poll `cond` until it returns true or `timeout` elapses.
pub async fn wait_for<F, Fut>(mut cond: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
