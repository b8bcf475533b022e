// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up CRUD and compare-and-transition operations.

use rusqlite::params;
use vigil_core::VigilError;

use crate::database::{Database, now_ts};
use crate::models::{FollowupStatus, ScheduledFollowup, parse_col};

const FOLLOWUP_COLUMNS: &str =
    "id, session_id, user_id, severity, fire_at, status, sent_at, created_at, updated_at";

fn row_to_followup(row: &rusqlite::Row<'_>) -> Result<ScheduledFollowup, rusqlite::Error> {
    Ok(ScheduledFollowup {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        severity: parse_col(3, row.get::<_, String>(3)?)?,
        fire_at: row.get(4)?,
        status: parse_col(5, row.get::<_, String>(5)?)?,
        sent_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert a new scheduled follow-up.
pub async fn create_followup(
    db: &Database,
    followup: &ScheduledFollowup,
) -> Result<(), VigilError> {
    let followup = followup.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO followups (id, session_id, user_id, severity, fire_at, status,
                                        sent_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    followup.id,
                    followup.session_id,
                    followup.user_id,
                    followup.severity.to_string(),
                    followup.fire_at,
                    followup.status.to_string(),
                    followup.sent_at,
                    followup.created_at,
                    followup.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a follow-up by id.
pub async fn get_followup(
    db: &Database,
    id: &str,
) -> Result<Option<ScheduledFollowup>, VigilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_followup);
            match result {
                Ok(followup) => Ok(Some(followup)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The at-most-one pending follow-up for a user.
pub async fn pending_followup_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Option<ScheduledFollowup>, VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups
                 WHERE user_id = ?1 AND status = 'pending'
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![user_id], row_to_followup);
            match result {
                Ok(followup) => Ok(Some(followup)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent follow-up for a user in any status.
pub async fn latest_followup_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Option<ScheduledFollowup>, VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups
                 WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![user_id], row_to_followup);
            match result {
                Ok(followup) => Ok(Some(followup)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// A sent follow-up whose sent_at is at or after `since`, most recent first.
pub async fn sent_followup_for_user_since(
    db: &Database,
    user_id: &str,
    since: &str,
) -> Result<Option<ScheduledFollowup>, VigilError> {
    let user_id = user_id.to_string();
    let since = since.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups
                 WHERE user_id = ?1 AND status = 'sent' AND sent_at >= ?2
                 ORDER BY sent_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![user_id, since], row_to_followup);
            match result {
                Ok(followup) => Ok(Some(followup)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compare-and-transition a follow-up's status. Transitions to `sent`
/// record the send timestamp.
pub async fn transition_followup(
    db: &Database,
    id: &str,
    from: FollowupStatus,
    to: FollowupStatus,
) -> Result<bool, VigilError> {
    let id = id.to_string();
    let sent = to == FollowupStatus::Sent;
    let from = from.to_string();
    let to = to.to_string();
    db.connection()
        .call(move |conn| {
            let now = now_ts();
            let changed = conn.execute(
                "UPDATE followups
                 SET status = ?1,
                     sent_at = COALESCE(?2, sent_at),
                     updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    to,
                    if sent { Some(now.clone()) } else { None },
                    now,
                    id,
                    from
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_followup(id: &str, user_id: &str) -> ScheduledFollowup {
        let now = now_ts();
        ScheduledFollowup {
            id: id.to_string(),
            session_id: format!("sess-{id}"),
            user_id: user_id.to_string(),
            severity: Severity::High,
            fire_at: now.clone(),
            status: FollowupStatus::Pending,
            sent_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let (db, _dir) = setup_db().await;
        create_followup(&db, &make_followup("f1", "user-1")).await.unwrap();

        let followup = get_followup(&db, "f1").await.unwrap().unwrap();
        assert_eq!(followup.status, FollowupStatus::Pending);
        assert!(followup.sent_at.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pending_lookup_excludes_terminal() {
        let (db, _dir) = setup_db().await;
        create_followup(&db, &make_followup("f1", "user-1")).await.unwrap();

        assert!(pending_followup_for_user(&db, "user-1").await.unwrap().is_some());

        transition_followup(&db, "f1", FollowupStatus::Pending, FollowupStatus::Cancelled)
            .await
            .unwrap();
        assert!(pending_followup_for_user(&db, "user-1").await.unwrap().is_none());

        // latest still sees the cancelled record for rate limiting.
        assert!(latest_followup_for_user(&db, "user-1").await.unwrap().is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_to_sent_records_timestamp() {
        let (db, _dir) = setup_db().await;
        create_followup(&db, &make_followup("f1", "user-1")).await.unwrap();

        let won = transition_followup(&db, "f1", FollowupStatus::Pending, FollowupStatus::Sent)
            .await
            .unwrap();
        assert!(won);

        let followup = get_followup(&db, "f1").await.unwrap().unwrap();
        assert_eq!(followup.status, FollowupStatus::Sent);
        assert!(followup.sent_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn sent_since_correlates_replies() {
        let (db, _dir) = setup_db().await;
        create_followup(&db, &make_followup("f1", "user-1")).await.unwrap();
        transition_followup(&db, "f1", FollowupStatus::Pending, FollowupStatus::Sent)
            .await
            .unwrap();

        // A window opening in the past finds it.
        let hit = sent_followup_for_user_since(&db, "user-1", "2000-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert!(hit.is_some());

        // A window opening in the future does not.
        let miss = sent_followup_for_user_since(&db, "user-1", "2999-01-01T00:00:00.000Z")
            .await
            .unwrap();
        assert!(miss.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn double_send_loses_cas() {
        let (db, _dir) = setup_db().await;
        create_followup(&db, &make_followup("f1", "user-1")).await.unwrap();

        assert!(
            transition_followup(&db, "f1", FollowupStatus::Pending, FollowupStatus::Sent)
                .await
                .unwrap()
        );
        assert!(
            !transition_followup(&db, "f1", FollowupStatus::Pending, FollowupStatus::Sent)
                .await
                .unwrap()
        );

        db.close().await.unwrap();
    }
}
