// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vigil status` command: entity counts from the store.

use vigil_config::VigilConfig;
use vigil_core::{CrisisStore, VigilError};
use vigil_storage::SqliteStore;

/// Runs the `vigil status` command.
pub async fn run_status(config: VigilConfig) -> Result<(), VigilError> {
    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;

    let counts = store.engine_counts().await?;
    println!("vigil status ({})", config.storage.database_path);
    println!("  open alerts:       {}", counts.open_alerts);
    println!("  live sessions:     {}", counts.active_sessions);
    println!("  pending follow-ups: {}", counts.pending_followups);
    println!("  pending timers:    {}", counts.pending_timers);

    store.close().await
}
