// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable timer records.
//!
//! Armed timers persist their deadline here so a process restart can
//! re-derive outstanding work. In-memory timer tasks are disposable.

use rusqlite::params;
use vigil_core::VigilError;

use crate::database::{Database, now_ts};
use crate::models::{TimerKind, TimerRecord, TimerStatus, parse_col};

const TIMER_COLUMNS: &str = "id, kind, entity_id, fire_at, status, created_at, updated_at";

fn row_to_timer(row: &rusqlite::Row<'_>) -> Result<TimerRecord, rusqlite::Error> {
    Ok(TimerRecord {
        id: row.get(0)?,
        kind: parse_col(1, row.get::<_, String>(1)?)?,
        entity_id: row.get(2)?,
        fire_at: row.get(3)?,
        status: parse_col(4, row.get::<_, String>(4)?)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Persist a new timer record.
pub async fn create_timer(db: &Database, timer: &TimerRecord) -> Result<(), VigilError> {
    let timer = timer.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO timers (id, kind, entity_id, fire_at, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    timer.id,
                    timer.kind.to_string(),
                    timer.entity_id,
                    timer.fire_at,
                    timer.status.to_string(),
                    timer.created_at,
                    timer.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All timers still pending, soonest deadline first.
pub async fn pending_timers(db: &Database) -> Result<Vec<TimerRecord>, VigilError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TIMER_COLUMNS} FROM timers
                 WHERE status = 'pending' ORDER BY fire_at ASC"
            ))?;
            let rows = stmt.query_map([], row_to_timer)?;
            let mut timers = Vec::new();
            for row in rows {
                timers.push(row?);
            }
            Ok(timers)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The pending timer of a given kind for an entity, if any.
pub async fn pending_timer_for_entity(
    db: &Database,
    kind: TimerKind,
    entity_id: &str,
) -> Result<Option<TimerRecord>, VigilError> {
    let kind = kind.to_string();
    let entity_id = entity_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TIMER_COLUMNS} FROM timers
                 WHERE kind = ?1 AND entity_id = ?2 AND status = 'pending'
                 LIMIT 1"
            ))?;
            let result = stmt.query_row(params![kind, entity_id], row_to_timer);
            match result {
                Ok(timer) => Ok(Some(timer)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compare-and-transition a timer's status.
pub async fn transition_timer(
    db: &Database,
    id: &str,
    from: TimerStatus,
    to: TimerStatus,
) -> Result<bool, VigilError> {
    let id = id.to_string();
    let from = from.to_string();
    let to = to.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE timers SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![to, now_ts(), id, from],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_timer(id: &str, kind: TimerKind, entity_id: &str, fire_at: &str) -> TimerRecord {
        let now = now_ts();
        TimerRecord {
            id: id.to_string(),
            kind,
            entity_id: entity_id.to_string(),
            fire_at: fire_at.to_string(),
            status: TimerStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn pending_timers_ordered_by_deadline() {
        let (db, _dir) = setup_db().await;
        create_timer(
            &db,
            &make_timer("t2", TimerKind::Followup, "f1", "2026-03-01T12:00:00.000Z"),
        )
        .await
        .unwrap();
        create_timer(
            &db,
            &make_timer("t1", TimerKind::AutoInitiate, "a1", "2026-03-01T10:00:00.000Z"),
        )
        .await
        .unwrap();

        let pending = pending_timers(&db).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "t1");
        assert_eq!(pending[1].id, "t2");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn completed_timers_drop_out_of_pending() {
        let (db, _dir) = setup_db().await;
        create_timer(
            &db,
            &make_timer("t1", TimerKind::AutoInitiate, "a1", "2026-03-01T10:00:00.000Z"),
        )
        .await
        .unwrap();

        assert!(
            transition_timer(&db, "t1", TimerStatus::Pending, TimerStatus::Completed)
                .await
                .unwrap()
        );
        assert!(pending_timers(&db).await.unwrap().is_empty());

        // Cancel after completion loses.
        assert!(
            !transition_timer(&db, "t1", TimerStatus::Pending, TimerStatus::Cancelled)
                .await
                .unwrap()
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn entity_lookup_finds_pending_only() {
        let (db, _dir) = setup_db().await;
        create_timer(
            &db,
            &make_timer("t1", TimerKind::AutoInitiate, "a1", "2026-03-01T10:00:00.000Z"),
        )
        .await
        .unwrap();

        let found = pending_timer_for_entity(&db, TimerKind::AutoInitiate, "a1")
            .await
            .unwrap();
        assert!(found.is_some());

        // Wrong kind misses.
        let miss = pending_timer_for_entity(&db, TimerKind::Followup, "a1")
            .await
            .unwrap();
        assert!(miss.is_none());

        transition_timer(&db, "t1", TimerStatus::Pending, TimerStatus::Cancelled)
            .await
            .unwrap();
        assert!(
            pending_timer_for_entity(&db, TimerKind::AutoInitiate, "a1")
                .await
                .unwrap()
                .is_none()
        );

        db.close().await.unwrap();
    }
}
