// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD, activity refresh, and compare-and-transition operations.

use rusqlite::params;
use vigil_core::VigilError;

use crate::database::{Database, now_ts};
use crate::models::{
    AshSession, EndReason, SessionMessage, SessionStatus, parse_col, parse_opt_col,
};

const SESSION_COLUMNS: &str = "id, user_id, channel_id, trigger_severity, trigger, status, \
                               end_reason, handoff_actor, started_at, last_activity_at, ended_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<AshSession, rusqlite::Error> {
    Ok(AshSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        channel_id: row.get(2)?,
        trigger_severity: parse_col(3, row.get::<_, String>(3)?)?,
        trigger: parse_col(4, row.get::<_, String>(4)?)?,
        status: parse_col(5, row.get::<_, String>(5)?)?,
        end_reason: parse_opt_col(6, row.get::<_, Option<String>>(6)?)?,
        handoff_actor: row.get(7)?,
        started_at: row.get(8)?,
        last_activity_at: row.get(9)?,
        ended_at: row.get(10)?,
    })
}

/// Insert a new session.
pub async fn create_session(db: &Database, session: &AshSession) -> Result<(), VigilError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, channel_id, trigger_severity, trigger,
                                       status, end_reason, handoff_actor, started_at,
                                       last_activity_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    session.id,
                    session.user_id,
                    session.channel_id,
                    session.trigger_severity.to_string(),
                    session.trigger.to_string(),
                    session.status.to_string(),
                    session.end_reason.map(|r| r.to_string()),
                    session.handoff_actor,
                    session.started_at,
                    session.last_activity_at,
                    session.ended_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<AshSession>, VigilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The at-most-one session in a non-terminal status for a user.
pub async fn active_session_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Option<AshSession>, VigilError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE user_id = ?1 AND status IN ('starting', 'active', 'idle_pending')
                 ORDER BY started_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![user_id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List sessions in a given status.
pub async fn sessions_in_status(
    db: &Database,
    status: SessionStatus,
) -> Result<Vec<AshSession>, VigilError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status = ?1 ORDER BY started_at DESC"
            ))?;
            let rows = stmt.query_map(params![status], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Refresh a session's last-activity timestamp.
pub async fn touch_session_activity(db: &Database, id: &str, at: &str) -> Result<(), VigilError> {
    let id = id.to_string();
    let at = at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET last_activity_at = ?1 WHERE id = ?2",
                params![at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Compare-and-transition a session's status over any of the `from` statuses.
///
/// Terminal transitions record the end reason, hand-off actor, and ended_at.
/// Returns true only if the session was still in one of `from`.
pub async fn transition_session(
    db: &Database,
    id: &str,
    from: &[SessionStatus],
    to: SessionStatus,
    reason: Option<EndReason>,
    actor: Option<&str>,
) -> Result<bool, VigilError> {
    let id = id.to_string();
    let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();
    let to_terminal = matches!(to, SessionStatus::Ended | SessionStatus::HandedOff);
    let to = to.to_string();
    let reason = reason.map(|r| r.to_string());
    let actor = actor.map(|a| a.to_string());
    db.connection()
        .call(move |conn| {
            // Dynamic IN list; statuses are enum wire names, not user input.
            let now = now_ts();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![
                Box::new(to.clone()),
                Box::new(reason.clone()),
                Box::new(actor.clone()),
                Box::new(if to_terminal { Some(now) } else { None::<String> }),
                Box::new(id.clone()),
            ];
            for status in &from {
                params_vec.push(Box::new(status.clone()));
            }
            let in_list: Vec<String> = (0..from.len()).map(|i| format!("?{}", i + 6)).collect();
            let sql = format!(
                "UPDATE sessions
                 SET status = ?1,
                     end_reason = COALESCE(?2, end_reason),
                     handoff_actor = COALESCE(?3, handoff_actor),
                     ended_at = COALESCE(?4, ended_at)
                 WHERE id = ?5 AND status IN ({})",
                in_list.join(", ")
            );
            let changed = conn.execute(
                &sql,
                rusqlite::params_from_iter(params_vec.iter().map(|p| p.as_ref())),
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Append a message to a session's transcript.
pub async fn append_session_message(
    db: &Database,
    message: &SessionMessage,
) -> Result<(), VigilError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO session_messages (id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.session_id,
                    message.role,
                    message.content,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a session's transcript in chronological order, optionally limited
/// to the most recent `limit` entries.
pub async fn session_messages(
    db: &Database,
    session_id: &str,
    limit: Option<i64>,
) -> Result<Vec<SessionMessage>, VigilError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut messages = Vec::new();
            match limit {
                Some(limit) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, role, content, created_at
                         FROM (SELECT id, session_id, role, content, created_at
                               FROM session_messages WHERE session_id = ?1
                               ORDER BY created_at DESC LIMIT ?2)
                         ORDER BY created_at ASC",
                    )?;
                    let rows = stmt.query_map(params![session_id, limit], |row| {
                        Ok(SessionMessage {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            role: row.get(2)?,
                            content: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, role, content, created_at
                         FROM session_messages WHERE session_id = ?1
                         ORDER BY created_at ASC",
                    )?;
                    let rows = stmt.query_map(params![session_id], |row| {
                        Ok(SessionMessage {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            role: row.get(2)?,
                            content: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?;
                    for row in rows {
                        messages.push(row?);
                    }
                }
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, SessionTrigger};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_session(id: &str, user_id: &str) -> AshSession {
        let now = now_ts();
        AshSession {
            id: id.to_string(),
            user_id: user_id.to_string(),
            channel_id: "chan-1".to_string(),
            trigger_severity: Severity::High,
            trigger: SessionTrigger::AutoInitiated,
            status: SessionStatus::Starting,
            end_reason: None,
            handoff_actor: None,
            started_at: now.clone(),
            last_activity_at: now,
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_session_round_trips() {
        let (db, _dir) = setup_db().await;
        create_session(&db, &make_session("s1", "user-1")).await.unwrap();

        let session = get_session(&db, "s1").await.unwrap().unwrap();
        assert_eq!(session.trigger, SessionTrigger::AutoInitiated);
        assert_eq!(session.status, SessionStatus::Starting);
        assert!(session.end_reason.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn active_lookup_spans_all_live_statuses() {
        let (db, _dir) = setup_db().await;
        create_session(&db, &make_session("s1", "user-1")).await.unwrap();

        assert!(active_session_for_user(&db, "user-1").await.unwrap().is_some());

        transition_session(
            &db,
            "s1",
            &[SessionStatus::Starting],
            SessionStatus::Active,
            None,
            None,
        )
        .await
        .unwrap();
        assert!(active_session_for_user(&db, "user-1").await.unwrap().is_some());

        transition_session(
            &db,
            "s1",
            &[SessionStatus::Active],
            SessionStatus::Ended,
            Some(EndReason::UserEnded),
            None,
        )
        .await
        .unwrap();
        assert!(active_session_for_user(&db, "user-1").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_from_multiple_prestates() {
        let (db, _dir) = setup_db().await;
        let mut session = make_session("s1", "user-1");
        session.status = SessionStatus::Active;
        create_session(&db, &session).await.unwrap();

        // Hand-off pre-empts from either active or idle_pending.
        let won = transition_session(
            &db,
            "s1",
            &[SessionStatus::Active, SessionStatus::IdlePending],
            SessionStatus::HandedOff,
            Some(EndReason::HandedOff),
            Some("responder-3"),
        )
        .await
        .unwrap();
        assert!(won);

        let stored = get_session(&db, "s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::HandedOff);
        assert_eq!(stored.end_reason, Some(EndReason::HandedOff));
        assert_eq!(stored.handoff_actor.as_deref(), Some("responder-3"));
        assert!(stored.ended_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn losing_transition_is_noop() {
        let (db, _dir) = setup_db().await;
        let mut session = make_session("s1", "user-1");
        session.status = SessionStatus::Active;
        create_session(&db, &session).await.unwrap();

        // Idle timeout wins the race.
        assert!(
            transition_session(
                &db,
                "s1",
                &[SessionStatus::Active],
                SessionStatus::Ended,
                Some(EndReason::IdleTimeout),
                None,
            )
            .await
            .unwrap()
        );

        // A late hand-off loses and must not overwrite the end reason.
        assert!(
            !transition_session(
                &db,
                "s1",
                &[SessionStatus::Active, SessionStatus::IdlePending],
                SessionStatus::HandedOff,
                Some(EndReason::HandedOff),
                Some("responder-3"),
            )
            .await
            .unwrap()
        );

        let stored = get_session(&db, "s1").await.unwrap().unwrap();
        assert_eq!(stored.end_reason, Some(EndReason::IdleTimeout));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn touch_updates_last_activity() {
        let (db, _dir) = setup_db().await;
        create_session(&db, &make_session("s1", "user-1")).await.unwrap();

        touch_session_activity(&db, "s1", "2026-03-01T10:00:00.000Z")
            .await
            .unwrap();
        let session = get_session(&db, "s1").await.unwrap().unwrap();
        assert_eq!(session.last_activity_at, "2026-03-01T10:00:00.000Z");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transcript_append_and_fetch_with_limit() {
        let (db, _dir) = setup_db().await;
        create_session(&db, &make_session("s1", "user-1")).await.unwrap();

        for i in 0..5 {
            append_session_message(
                &db,
                &SessionMessage {
                    id: format!("m{i}"),
                    session_id: "s1".to_string(),
                    role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                    content: format!("message {i}"),
                    created_at: format!("2026-03-01T10:00:0{i}.000Z"),
                },
            )
            .await
            .unwrap();
        }

        let all = session_messages(&db, "s1", None).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].content, "message 0");

        // Limit keeps the most recent entries, still in chronological order.
        let recent = session_messages(&db, "s1", Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "message 3");
        assert_eq!(recent[1].content, "message 4");

        db.close().await.unwrap();
    }
}
