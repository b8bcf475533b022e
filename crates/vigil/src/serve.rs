// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vigil serve` command implementation.
//!
//! Wires the SQLite store, classification gateway, console transport, and
//! template generator into the crisis engine, runs the startup recovery
//! sweep, and enters the event loop until SIGINT/SIGTERM.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vigil_classifier::ClassificationGateway;
use vigil_config::VigilConfig;
use vigil_console::ConsoleTransport;
use vigil_core::{CrisisStore, VigilError};
use vigil_engine::CrisisEngine;
use vigil_storage::SqliteStore;

use crate::generator::TemplateGenerator;

/// Runs the `vigil serve` command.
pub async fn run_serve(config: VigilConfig) -> Result<(), VigilError> {
    init_tracing(&config.agent.log_level);
    vigil_engine::recording::register_metrics();

    info!(agent = config.agent.name.as_str(), "starting vigil serve");

    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    let store: Arc<dyn CrisisStore> = Arc::new(store);

    let transport = Arc::new(ConsoleTransport::new(config.console.clone()));
    transport.connect().await;

    let generator = Arc::new(TemplateGenerator::new());
    let gateway = Arc::new(ClassificationGateway::new(&config.classifier)?);

    let engine = Arc::new(CrisisEngine::new(
        config,
        store,
        transport,
        generator,
        gateway,
    ));

    // Re-derive armed timers and pending follow-ups from the store before
    // accepting events; the process itself is not durable.
    engine.recover().await?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    engine.run(cancel).await
}

/// Initializes the tracing subscriber from the configured log level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vigil={log_level},warn")));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Cancels the token on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    cancel.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => info!("SIGINT received"),
                _ = sigterm.recv() => info!("SIGTERM received"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("SIGINT received");
        }

        cancel.cancel();
    });
}
