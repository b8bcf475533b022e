// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests driving the full engine loop: classifier (wiremock) ->
//! dispatch -> escalation -> session -> follow-up, over mock transport and
//! a temp SQLite store.
//!
//! These run against the real clock with second-scale windows configured
//! through the harness.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vigil_core::types::{InteractionAction, SessionTrigger, Severity};
use vigil_core::{AlertStatus, SessionStatus, TimerKind, TimerRecord, TimerStatus};
use vigil_test_utils::{TestHarness, wait_for};

const WAIT: Duration = Duration::from_secs(10);

async fn classifier_returning(severity: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "severity": severity,
            "confidence": 0.92,
            "categories": ["self-harm"],
            "rationale": "first-person statement of intent",
            "needs_review": false
        })))
        .mount(&server)
        .await;
    server
}

async fn fast_harness(server: &MockServer) -> TestHarness {
    TestHarness::builder()
        .with_classifier_url(&server.uri())
        .with_config(|config| {
            config.escalation.delay_secs = 1;
            config.session.idle_timeout_secs = 2;
            config.session.max_duration_secs = 60;
            config.followup.delay_secs = 1;
            config.followup.min_session_secs = 0;
            config.classifier.max_retries = 0;
        })
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn high_severity_message_produces_routed_alert() {
    let server = classifier_returning("high").await;
    // Long escalation delay so auto-initiate stays out of the picture.
    let harness = TestHarness::builder()
        .with_classifier_url(&server.uri())
        .with_config(|config| config.escalation.delay_secs = 300)
        .build()
        .await
        .unwrap();
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "I can't do this anymore");

    let transport = harness.transport.clone();
    assert!(
        wait_for(
            || {
                let transport = transport.clone();
                async move { !transport.alert_posts().await.is_empty() }
            },
            WAIT
        )
        .await
    );

    let posts = harness.transport.alert_posts().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel_id, "crt-urgent");
    assert!(posts[0].broadcast);
    assert_eq!(posts[0].user_id, "alice");

    // The alert row and its escalation timer are durable.
    let alert = harness
        .store
        .active_alert_for_user("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.severity, Severity::High);
    assert!(
        harness
            .store
            .pending_timer_for_entity(TimerKind::AutoInitiate, &alert.id)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn below_threshold_and_degraded_dispatch_nothing() {
    // Low severity: scored but under the default medium threshold.
    let low_server = classifier_returning("low").await;
    let harness = fast_harness(&low_server).await;
    harness.spawn().await.unwrap();
    harness
        .transport
        .inject_channel_message("alice", "general", "kind of a rough day");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(harness.transport.alert_posts().await.is_empty());
    assert_eq!(harness.store.engine_counts().await.unwrap().open_alerts, 0);
    drop(harness);

    // Degraded: the classifier is down, and silence is preferred over
    // guessing.
    let dead_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&dead_server)
        .await;
    let harness = fast_harness(&dead_server).await;
    harness.spawn().await.unwrap();
    harness
        .transport
        .inject_channel_message("bob", "general", "I can't do this anymore");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(harness.transport.alert_posts().await.is_empty());
    assert_eq!(harness.store.engine_counts().await.unwrap().open_alerts, 0);
}

#[tokio::test]
async fn cooldown_allows_exactly_one_alert() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "I want to disappear");
    let transport = harness.transport.clone();
    assert!(
        wait_for(
            || {
                let transport = transport.clone();
                async move { !transport.alert_posts().await.is_empty() }
            },
            WAIT
        )
        .await
    );

    // A second qualifying message shortly after stays suppressed.
    harness
        .transport
        .inject_channel_message("alice", "general", "nobody would even notice");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.transport.alert_posts().await.len(), 1);
}

#[tokio::test]
async fn acknowledged_alert_never_auto_initiates() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "I can't keep going");

    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move { store.active_alert_for_user("alice").await.unwrap().is_some() }
            },
            WAIT
        )
        .await
    );
    let alert = harness
        .store
        .active_alert_for_user("alice")
        .await
        .unwrap()
        .unwrap();

    // A human acknowledges well before the 1s deadline.
    harness
        .transport
        .inject_interaction("responder", &alert.id, InteractionAction::Acknowledge);

    let store = harness.store.clone();
    let alert_id = alert.id.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                let alert_id = alert_id.clone();
                async move {
                    store.get_alert(&alert_id).await.unwrap().unwrap().status
                        == AlertStatus::Acknowledged
                }
            },
            WAIT
        )
        .await
    );

    // Past the deadline: no contact ever happens.
    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert!(harness.store.active_session_for_user("alice").await.unwrap().is_none());
    assert!(harness.transport.dms_to("alice").await.is_empty());
}

#[tokio::test]
async fn unacknowledged_alert_auto_initiates_contact() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "I give up");

    // After the 1s escalation delay, Ash reaches out.
    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    matches!(
                        store.active_session_for_user("alice").await.unwrap(),
                        Some(session) if session.status == SessionStatus::Active
                    )
                }
            },
            WAIT
        )
        .await
    );

    let session = harness
        .store
        .active_session_for_user("alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.trigger, SessionTrigger::AutoInitiated);
    assert_eq!(session.trigger_severity, Severity::High);

    // The opening DM went out and the alert reflects automatic contact.
    assert_eq!(harness.transport.dms_to("alice").await.len(), 1);
    let alerts_updated = harness.transport.post_updates().await;
    assert!(!alerts_updated.is_empty());
}

#[tokio::test]
async fn opt_out_during_wait_expires_instead_of_contacting() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "what's the point");

    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move { store.active_alert_for_user("alice").await.unwrap().is_some() }
            },
            WAIT
        )
        .await
    );
    let alert = harness
        .store
        .active_alert_for_user("alice")
        .await
        .unwrap()
        .unwrap();

    // Preference flips after the timer was armed.
    harness.store.set_opt_out("alice", true).await.unwrap();

    let store = harness.store.clone();
    let alert_id = alert.id.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                let alert_id = alert_id.clone();
                async move {
                    store.get_alert(&alert_id).await.unwrap().unwrap().status
                        == AlertStatus::Expired
                }
            },
            WAIT
        )
        .await
    );
    assert!(harness.transport.dms_to("alice").await.is_empty());
}

#[tokio::test]
async fn initiate_now_starts_manual_session() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "I feel hopeless");

    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move { store.active_alert_for_user("alice").await.unwrap().is_some() }
            },
            WAIT
        )
        .await
    );
    let alert = harness
        .store
        .active_alert_for_user("alice")
        .await
        .unwrap()
        .unwrap();

    harness
        .transport
        .inject_interaction("responder", &alert.id, InteractionAction::InitiateNow);

    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    matches!(
                        store.active_session_for_user("alice").await.unwrap(),
                        Some(session) if session.trigger == SessionTrigger::Manual
                    )
                }
            },
            WAIT
        )
        .await
    );

    let stored = harness.store.get_alert(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlertStatus::Acknowledged);
    assert_eq!(stored.acknowledged_by.as_deref(), Some("responder"));
}

#[tokio::test]
async fn team_activity_hands_session_to_human() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "I can't take it");

    // Wait for auto-initiated contact.
    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    matches!(
                        store.active_session_for_user("alice").await.unwrap(),
                        Some(session) if session.status == SessionStatus::Active
                    )
                }
            },
            WAIT
        )
        .await
    );
    let session = harness
        .store
        .active_session_for_user("alice")
        .await
        .unwrap()
        .unwrap();

    // A responder speaks in the session's context channel.
    harness.transport.inject_team_message(
        "responder",
        "general",
        "Hey Alice, I'm here now",
        &["crisis-response"],
    );

    let store = harness.store.clone();
    let session_id = session.id.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                let session_id = session_id.clone();
                async move {
                    store.get_session(&session_id).await.unwrap().unwrap().status
                        == SessionStatus::HandedOff
                }
            },
            WAIT
        )
        .await
    );

    let announcements = harness.transport.channel_messages().await;
    assert!(
        announcements.iter().any(|(channel, _)| channel == "general"),
        "hand-off announcement expected in the context channel"
    );
}

#[tokio::test]
async fn restart_with_overdue_timer_escalates_immediately() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;

    // Simulate the previous process: a persisted alert whose escalation
    // deadline passed while the process was down.
    let past = (chrono::Utc::now() - chrono::Duration::seconds(120))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    harness
        .store
        .create_alert(&vigil_core::Alert {
            id: "alert-recovered".to_string(),
            message_id: "msg-1".to_string(),
            user_id: "alice".to_string(),
            channel_id: "general".to_string(),
            severity: Severity::High,
            status: AlertStatus::Created,
            acknowledged_by: None,
            post_ref: None,
            created_at: past.clone(),
            updated_at: past.clone(),
        })
        .await
        .unwrap();
    harness
        .store
        .create_timer(&TimerRecord {
            id: "timer-recovered".to_string(),
            kind: TimerKind::AutoInitiate,
            entity_id: "alert-recovered".to_string(),
            fire_at: past.clone(),
            status: TimerStatus::Pending,
            created_at: past,
            updated_at: now,
        })
        .await
        .unwrap();

    // Startup runs the recovery sweep and the overdue deadline fires now.
    harness.spawn().await.unwrap();

    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    store.get_alert("alert-recovered").await.unwrap().unwrap().status
                        == AlertStatus::AutoInitiated
                }
            },
            WAIT
        )
        .await
    );
    assert!(
        harness
            .store
            .active_session_for_user("alice")
            .await
            .unwrap()
            .is_some(),
        "recovered escalation should have started contact"
    );
}

#[tokio::test]
async fn idle_session_schedules_followup_and_reply_continues() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "everything is falling apart");

    // Auto-initiate (1s), then the session idles out (2s more).
    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    matches!(
                        store.sessions_in_status(SessionStatus::Ended).await.unwrap().first(),
                        Some(session)
                            if session.end_reason == Some(vigil_core::EndReason::IdleTimeout)
                    )
                }
            },
            WAIT
        )
        .await
    );

    // The follow-up fires 1s after session end and sends one check-in.
    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    matches!(
                        store.latest_followup_for_user("alice").await.unwrap(),
                        Some(followup)
                            if followup.status == vigil_core::FollowupStatus::Sent
                    )
                }
            },
            WAIT
        )
        .await
    );

    // DMs so far: opening, idle closing line, check-in.
    let dms = harness.transport.dms_to("alice").await;
    assert_eq!(dms.len(), 3);

    // A reply within the window starts a continuation session.
    harness.transport.inject_dm("alice", "thanks for checking in");
    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    matches!(
                        store.active_session_for_user("alice").await.unwrap(),
                        Some(session) if session.trigger == SessionTrigger::FollowupReply
                    )
                }
            },
            WAIT
        )
        .await
    );
}

#[tokio::test]
async fn opted_out_session_end_gets_no_followup() {
    let server = classifier_returning("high").await;
    let harness = fast_harness(&server).await;
    harness.spawn().await.unwrap();

    harness
        .transport
        .inject_channel_message("alice", "general", "I'm done with everything");

    // Wait for the auto-initiated session.
    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move { store.active_session_for_user("alice").await.unwrap().is_some() }
            },
            WAIT
        )
        .await
    );

    // Opt out, then send a DM; the session ends with reason opted_out.
    harness.store.set_opt_out("alice", true).await.unwrap();
    harness.transport.inject_dm("alice", "please stop contacting me");

    let store = harness.store.clone();
    assert!(
        wait_for(
            || {
                let store = store.clone();
                async move {
                    store
                        .sessions_in_status(SessionStatus::Ended)
                        .await
                        .unwrap()
                        .iter()
                        .any(|s| s.end_reason == Some(vigil_core::EndReason::OptedOut))
                }
            },
            WAIT
        )
        .await
    );

    // No follow-up is ever scheduled for an opted-out ending.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(
        harness
            .store
            .latest_followup_for_user("alice")
            .await
            .unwrap()
            .is_none()
    );
}
