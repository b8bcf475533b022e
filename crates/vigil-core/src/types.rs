// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Vigil engine.
//!
//! All persisted entities carry string ids and RFC 3339 UTC timestamps so
//! that interactive affordances and timers can reference them across a
//! process restart.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Reference to a message delivered through the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in the plugin registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Generator,
    Classifier,
    Storage,
}

/// Ordered crisis severity level produced by the classifier.
///
/// The ordering is load-bearing: alert thresholds, auto-initiate
/// eligibility, and follow-up minimums all compare severities.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// A scored classification produced by the external classifier.
///
/// Produced once per message and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub severity: Severity,
    /// Confidence in [0, 1]; clamped at decode time.
    pub confidence: f32,
    /// Category tags (e.g. "self-harm", "substance-use").
    #[serde(default)]
    pub categories: Vec<String>,
    /// Free-text rationale from the classifier.
    #[serde(default)]
    pub rationale: String,
    /// The classifier itself recommends human review.
    #[serde(default)]
    pub needs_review: bool,
}

/// Outcome of a gateway classification attempt.
///
/// `Degraded` is the safety-biased fast path when the classifier is
/// unavailable or its input was invalid: no alert is ever dispatched from
/// a degraded result.
#[derive(Debug, Clone)]
pub enum Classification {
    Scored(ClassificationResult),
    Degraded { reason: String },
}

impl Classification {
    /// Severity of a scored result; `None` when degraded.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Classification::Scored(result) => Some(result.severity),
            Classification::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Classification::Degraded { .. })
    }
}

// --- Transport event types ---

/// An inbound chat message delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: String,
    pub author_id: String,
    pub channel_id: String,
    pub text: String,
    /// Role names held by the author, used by hand-off detection.
    pub author_roles: Vec<String>,
    /// True for direct messages to the agent.
    pub is_dm: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Interactive affordance carried on an alert post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum InteractionAction {
    /// A responder acknowledged the alert.
    #[strum(serialize = "ack")]
    Acknowledge,
    /// A responder asked for AI contact to start immediately.
    #[strum(serialize = "initiate")]
    InitiateNow,
}

/// A button click on an alert post. The binding is the persisted alert id,
/// so interactions remain actionable after a process restart.
#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub actor_id: String,
    pub alert_id: String,
    pub action: InteractionAction,
}

/// Event stream produced by a chat transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message(InboundMessage),
    Interaction(InteractionEvent),
}

/// A routed alert ready to be posted to a destination channel.
#[derive(Debug, Clone)]
pub struct AlertPost {
    pub alert_id: String,
    pub channel_id: String,
    pub severity: Severity,
    pub user_id: String,
    pub context_id: String,
    pub summary: String,
    /// Carry the response-team broadcast marker for high tiers.
    pub broadcast: bool,
    pub needs_review: bool,
}

// --- Reply generation types ---

/// Why a session came into being.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum SessionTrigger {
    #[strum(serialize = "manual")]
    #[serde(rename = "manual")]
    Manual,
    #[strum(serialize = "auto-initiated")]
    #[serde(rename = "auto-initiated")]
    AutoInitiated,
    #[strum(serialize = "followup-reply")]
    #[serde(rename = "followup-reply")]
    FollowupReply,
}

/// Where in the session lifecycle a reply is being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPhase {
    /// First contact: the opening DM.
    Opening,
    /// A reply within an active conversation.
    Reply,
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

/// Context handed to the black-box reply generator.
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub session_id: String,
    pub user_id: String,
    pub trigger: SessionTrigger,
    pub phase: ReplyPhase,
    pub transcript: Vec<TranscriptEntry>,
}

// --- Persisted entities ---

/// Lifecycle of an alert. `Created` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Created,
    Acknowledged,
    AutoInitiated,
    Expired,
}

/// A dispatched crisis alert. Never deleted, only status-transitioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// The originating chat message.
    pub message_id: String,
    pub user_id: String,
    pub channel_id: String,
    /// Severity at creation time.
    pub severity: Severity,
    pub status: AlertStatus,
    pub acknowledged_by: Option<String>,
    /// Transport reference to the posted alert message, for embed updates.
    pub post_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Lifecycle of an Ash conversation session.
///
/// `IdlePending` is the short window between the idle deadline elapsing
/// and the closing message going out; inbound activity no longer rescues
/// the session once it is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Active,
    IdlePending,
    HandedOff,
    Ended,
}

/// Why a session reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    IdleTimeout,
    MaxDuration,
    UserEnded,
    HandedOff,
    OptedOut,
    /// First contact could not be delivered; the session never went active.
    StartFailed,
    /// Closed by crash recovery after an unclean shutdown.
    Interrupted,
}

/// An AI conversation session with an at-risk user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AshSession {
    pub id: String,
    pub user_id: String,
    /// The channel the triggering alert came from; hand-off detection
    /// watches team activity here.
    pub channel_id: String,
    pub trigger_severity: Severity,
    pub trigger: SessionTrigger,
    pub status: SessionStatus,
    pub end_reason: Option<EndReason>,
    pub handoff_actor: Option<String>,
    pub started_at: String,
    pub last_activity_at: String,
    pub ended_at: Option<String>,
}

/// A message exchanged within a session, retained for generator context
/// and the closed-session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// Lifecycle of a scheduled follow-up check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FollowupStatus {
    Pending,
    Sent,
    Cancelled,
    SkippedOptedOut,
}

/// A deferred check-in armed after an eligible session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledFollowup {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    /// Severity at session end.
    pub severity: Severity,
    pub fire_at: String,
    pub status: FollowupStatus,
    pub sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// What a durable timer row fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    AutoInitiate,
    Followup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Pending,
    Completed,
    Cancelled,
}

/// A durable deadline record. Process restart re-derives outstanding
/// deadlines from these rows, never from in-memory timer objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerRecord {
    pub id: String,
    pub kind: TimerKind,
    pub entity_id: String,
    pub fire_at: String,
    pub status: TimerStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-user alert suppression window. Owned exclusively by the cooldown
/// guard; expired entries are removed lazily at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub user_id: String,
    pub expires_at: String,
}

/// Aggregate counts surfaced by the `status` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineCounts {
    pub open_alerts: u64,
    pub active_sessions: u64,
    pub pending_followups: u64,
    pub pending_timers: u64,
}
