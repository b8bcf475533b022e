// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metrics recording helpers using the metrics-rs facade.
//!
//! Exporter wiring is out of scope for this subsystem; any recorder
//! installed by the host process picks these up.

use metrics::{describe_counter, describe_gauge};
use vigil_core::{EndReason, SessionTrigger, Severity};

/// Register metric descriptions for all engine events.
pub fn register_metrics() {
    describe_counter!("vigil_alerts_total", "Alert lifecycle events by outcome");
    describe_counter!(
        "vigil_classifications_total",
        "Classification gateway outcomes"
    );
    describe_counter!("vigil_sessions_total", "Session lifecycle events");
    describe_counter!("vigil_followups_total", "Follow-up lifecycle events");
    describe_gauge!("vigil_active_sessions", "Currently active sessions");
}

pub fn record_alert_created(severity: Severity) {
    metrics::counter!("vigil_alerts_total",
        "event" => "created", "severity" => severity.to_string())
    .increment(1);
}

pub fn record_alert_acknowledged() {
    metrics::counter!("vigil_alerts_total", "event" => "acknowledged").increment(1);
}

pub fn record_alert_auto_initiated() {
    metrics::counter!("vigil_alerts_total", "event" => "auto_initiated").increment(1);
}

pub fn record_alert_expired(reason: &'static str) {
    metrics::counter!("vigil_alerts_total",
        "event" => "expired", "reason" => reason)
    .increment(1);
}

pub fn record_session_started(trigger: SessionTrigger) {
    metrics::counter!("vigil_sessions_total",
        "event" => "started", "trigger" => trigger.to_string())
    .increment(1);
}

pub fn record_session_ended(reason: EndReason) {
    metrics::counter!("vigil_sessions_total",
        "event" => "ended", "reason" => reason.to_string())
    .increment(1);
}

pub fn record_session_handed_off() {
    metrics::counter!("vigil_sessions_total", "event" => "handed_off").increment(1);
}

pub fn record_followup_scheduled() {
    metrics::counter!("vigil_followups_total", "event" => "scheduled").increment(1);
}

pub fn record_followup_sent() {
    metrics::counter!("vigil_followups_total", "event" => "sent").increment(1);
}

pub fn record_followup_skipped(reason: &'static str) {
    metrics::counter!("vigil_followups_total",
        "event" => "skipped", "reason" => reason)
    .increment(1);
}

pub fn set_active_sessions(count: f64) {
    metrics::gauge!("vigil_active_sessions").set(count);
}
