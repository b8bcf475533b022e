// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user alert cooldown guard.
//!
//! Suppresses repeated alert dispatch for the same user within a
//! configurable window, regardless of how many qualifying messages arrive.
//! Entries expire by timestamp comparison at read time and are removed
//! lazily; the periodic sweep only reclaims rows.
//!
//! The guard is deliberately not severity-aware: a cooldown set by a
//! low-severity alert also suppresses a subsequent high-severity alert
//! until expiry. This bounds alert volume per user and is a tunable policy,
//! not an accident.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use vigil_core::{CooldownEntry, CrisisStore, VigilError};

/// Cooldown guard backed by the persistent store, so windows survive a
/// process restart.
pub struct CooldownGuard {
    store: Arc<dyn CrisisStore>,
}

impl CooldownGuard {
    pub fn new(store: Arc<dyn CrisisStore>) -> Self {
        Self { store }
    }

    /// Whether the user is inside an active cooldown window.
    ///
    /// An expired entry is removed on the way out.
    pub async fn is_on_cooldown(&self, user_id: &str) -> Result<bool, VigilError> {
        let Some(entry) = self.store.get_cooldown(user_id).await? else {
            return Ok(false);
        };

        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        if entry.expires_at <= now {
            debug!(user_id, "cooldown expired, removing entry");
            self.store.clear_cooldown(user_id).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Start (or extend) the user's cooldown window.
    pub async fn set_cooldown(&self, user_id: &str, duration: Duration) -> Result<(), VigilError> {
        let expires_at = (Utc::now()
            + chrono::Duration::from_std(duration)
                .map_err(|e| VigilError::Internal(format!("cooldown duration overflow: {e}")))?)
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.store
            .set_cooldown(&CooldownEntry {
                user_id: user_id.to_string(),
                expires_at,
            })
            .await
    }

    /// Remove the user's cooldown window.
    pub async fn clear(&self, user_id: &str) -> Result<(), VigilError> {
        self.store.clear_cooldown(user_id).await
    }

    /// Reclaim expired rows. Correctness does not depend on this running.
    pub async fn sweep_expired(&self) -> Result<u64, VigilError> {
        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let removed = self.store.sweep_cooldowns(&now).await?;
        if removed > 0 {
            debug!(removed, "swept expired cooldown entries");
        }
        Ok(removed)
    }
}
