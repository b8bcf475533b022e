// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user cooldown entries.
//!
//! Correctness relies only on read-time timestamp comparison; the sweep
//! exists to reclaim rows, not to enforce expiry.

use rusqlite::params;
use vigil_core::VigilError;

use crate::database::Database;
use crate::models::CooldownEntry;

/// Get the cooldown entry for a user, expired or not.
pub async fn get_cooldown(
    db: &Database,
    user_id: &str,
) -> Result<Option<CooldownEntry>, VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT user_id, expires_at FROM cooldowns WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(CooldownEntry {
                        user_id: row.get(0)?,
                        expires_at: row.get(1)?,
                    })
                },
            );
            match result {
                Ok(entry) => Ok(Some(entry)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set (or replace) the cooldown entry for a user.
pub async fn set_cooldown(db: &Database, entry: &CooldownEntry) -> Result<(), VigilError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO cooldowns (user_id, expires_at) VALUES (?1, ?2)
                 ON CONFLICT (user_id) DO UPDATE SET expires_at = excluded.expires_at",
                params![entry.user_id, entry.expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Remove a user's cooldown entry.
pub async fn clear_cooldown(db: &Database, user_id: &str) -> Result<(), VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM cooldowns WHERE user_id = ?1", params![user_id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete all entries expired as of `now`. Returns how many were removed.
pub async fn sweep_cooldowns(db: &Database, now: &str) -> Result<u64, VigilError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM cooldowns WHERE expires_at <= ?1",
                params![now],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
