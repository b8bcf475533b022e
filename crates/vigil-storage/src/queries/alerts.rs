// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert CRUD and compare-and-transition operations.

use rusqlite::params;
use vigil_core::{MessageRef, VigilError};

use crate::database::{Database, now_ts};
use crate::models::{Alert, AlertStatus, parse_col};

fn row_to_alert(row: &rusqlite::Row<'_>) -> Result<Alert, rusqlite::Error> {
    Ok(Alert {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        channel_id: row.get(3)?,
        severity: parse_col(4, row.get::<_, String>(4)?)?,
        status: parse_col(5, row.get::<_, String>(5)?)?,
        acknowledged_by: row.get(6)?,
        post_ref: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const ALERT_COLUMNS: &str = "id, message_id, user_id, channel_id, severity, status, \
                             acknowledged_by, post_ref, created_at, updated_at";

/// Insert a new alert.
pub async fn create_alert(db: &Database, alert: &Alert) -> Result<(), VigilError> {
    let alert = alert.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO alerts (id, message_id, user_id, channel_id, severity, status,
                                     acknowledged_by, post_ref, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    alert.id,
                    alert.message_id,
                    alert.user_id,
                    alert.channel_id,
                    alert.severity.to_string(),
                    alert.status.to_string(),
                    alert.acknowledged_by,
                    alert.post_ref,
                    alert.created_at,
                    alert.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get an alert by id.
pub async fn get_alert(db: &Database, id: &str) -> Result<Option<Alert>, VigilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_alert);
            match result {
                Ok(alert) => Ok(Some(alert)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The at-most-one alert still in status `created` for a user.
pub async fn active_alert_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Option<Alert>, VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts
                 WHERE user_id = ?1 AND status = 'created'
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![user_id], row_to_alert);
            match result {
                Ok(alert) => Ok(Some(alert)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compare-and-transition an alert's status.
///
/// Returns true only if the alert was still in `from` when the update ran;
/// a false return means the caller lost the race and must treat the
/// operation as a no-op.
pub async fn transition_alert(
    db: &Database,
    id: &str,
    from: AlertStatus,
    to: AlertStatus,
    actor: Option<&str>,
) -> Result<bool, VigilError> {
    let id = id.to_string();
    let from = from.to_string();
    let to = to.to_string();
    let actor = actor.map(|a| a.to_string());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE alerts
                 SET status = ?1,
                     acknowledged_by = COALESCE(?2, acknowledged_by),
                     updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![to, actor, now_ts(), id, from],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the transport reference of the posted alert message.
pub async fn set_alert_post_ref(
    db: &Database,
    id: &str,
    post: &MessageRef,
) -> Result<(), VigilError> {
    let id = id.to_string();
    let post = post.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE alerts SET post_ref = ?1, updated_at = ?2 WHERE id = ?3",
                params![post, now_ts(), id],
            )?;
            Ok(())
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

    fn make_alert(id: &str, user_id: &str) -> Alert {
        let now = now_ts();
        Alert {
            id: id.to_string(),
            message_id: format!("msg-{id}"),
            user_id: user_id.to_string(),
            channel_id: "chan-1".to_string(),
            severity: Severity::High,
            status: AlertStatus::Created,
            acknowledged_by: None,
            post_ref: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_get_alert_round_trips() {
        let (db, _dir) = setup_db().await;
        let alert = make_alert("a1", "user-1");

        create_alert(&db, &alert).await.unwrap();
        let retrieved = get_alert(&db, "a1").await.unwrap().unwrap();
        assert_eq!(retrieved.id, "a1");
        assert_eq!(retrieved.severity, Severity::High);
        assert_eq!(retrieved.status, AlertStatus::Created);
        assert!(retrieved.acknowledged_by.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_nonexistent_alert_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_alert(&db, "missing").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn active_alert_lookup_ignores_terminal_statuses() {
        let (db, _dir) = setup_db().await;
        create_alert(&db, &make_alert("a1", "user-1")).await.unwrap();

        let active = active_alert_for_user(&db, "user-1").await.unwrap();
        assert_eq!(active.unwrap().id, "a1");

        transition_alert(&db, "a1", AlertStatus::Created, AlertStatus::Expired, None)
            .await
            .unwrap();
        assert!(active_alert_for_user(&db, "user-1").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let (db, _dir) = setup_db().await;
        create_alert(&db, &make_alert("a1", "user-1")).await.unwrap();

        // First transition wins.
        let won = transition_alert(
            &db,
            "a1",
            AlertStatus::Created,
            AlertStatus::Acknowledged,
            Some("responder-7"),
        )
        .await
        .unwrap();
        assert!(won);

        // Racing transition from the same pre-state loses.
        let lost = transition_alert(
            &db,
            "a1",
            AlertStatus::Created,
            AlertStatus::AutoInitiated,
            None,
        )
        .await
        .unwrap();
        assert!(!lost);

        let alert = get_alert(&db, "a1").await.unwrap().unwrap();
        assert_eq!(alert.status, AlertStatus::Acknowledged);
        assert_eq!(alert.acknowledged_by.as_deref(), Some("responder-7"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn post_ref_is_recorded() {
        let (db, _dir) = setup_db().await;
        create_alert(&db, &make_alert("a1", "user-1")).await.unwrap();

        set_alert_post_ref(&db, "a1", &MessageRef("platform-msg-42".into()))
            .await
            .unwrap();
        let alert = get_alert(&db, "a1").await.unwrap().unwrap();
        assert_eq!(alert.post_ref.as_deref(), Some("platform-msg-42"));

        db.close().await.unwrap();
    }
}
