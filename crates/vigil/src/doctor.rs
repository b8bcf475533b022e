// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vigil doctor` command: probe config, storage, and classifier health.

use vigil_classifier::ClassificationGateway;
use vigil_config::VigilConfig;
use vigil_core::{CrisisStore, HealthStatus, PluginAdapter, VigilError};
use vigil_storage::SqliteStore;

/// Runs the `vigil doctor` command.
///
/// The config was already loaded and validated by the caller, so reaching
/// this point means the config check passed.
pub async fn run_doctor(config: VigilConfig) -> Result<(), VigilError> {
    let mut failures = 0u32;

    println!("vigil doctor");
    println!("  [ok] config loaded and validated");

    // Storage: open, probe, close.
    let store = SqliteStore::new(config.storage.clone());
    match storage_check(&store).await {
        Ok(()) => println!("  [ok] storage at {}", config.storage.database_path),
        Err(e) => {
            failures += 1;
            println!("  [fail] storage: {e}");
        }
    }

    // Classifier: health endpoint probe.
    match classifier_check(&config).await {
        Ok(()) => println!("  [ok] classifier at {}", config.classifier.base_url),
        Err(e) => {
            failures += 1;
            println!("  [fail] classifier: {e}");
            println!("         alerts will degrade to silence until it recovers");
        }
    }

    if failures > 0 {
        return Err(VigilError::Internal(format!("{failures} check(s) failed")));
    }
    println!("all checks passed");
    Ok(())
}

async fn storage_check(store: &SqliteStore) -> Result<(), VigilError> {
    store.initialize().await?;
    match store.health_check().await? {
        HealthStatus::Healthy => {}
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            return Err(VigilError::Internal(reason));
        }
    }
    store.close().await
}

async fn classifier_check(config: &VigilConfig) -> Result<(), VigilError> {
    let gateway = ClassificationGateway::new(&config.classifier)?;
    match gateway.health_check().await? {
        HealthStatus::Healthy => Ok(()),
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            Err(VigilError::Internal(reason))
        }
    }
}
