// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User preference reads and writes.
//!
//! The opt-out flag is externally owned state. The engine only ever reads
//! it at the moment of a contact decision; the write path exists for the
//! preference surface and for tests.

use rusqlite::params;
use vigil_core::VigilError;

use crate::database::{Database, now_ts};

/// Whether the user has opted out of AI contact. Missing rows mean opted in.
pub async fn is_opted_out(db: &Database, user_id: &str) -> Result<bool, VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT opted_out FROM preferences WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, i64>(0),
            );
            match result {
                Ok(flag) => Ok(flag != 0),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set the opt-out flag for a user.
pub async fn set_opt_out(db: &Database, user_id: &str, opted_out: bool) -> Result<(), VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO preferences (user_id, opted_out, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id) DO UPDATE
                 SET opted_out = excluded.opted_out, updated_at = excluded.updated_at",
                params![user_id, opted_out as i64, now_ts()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
