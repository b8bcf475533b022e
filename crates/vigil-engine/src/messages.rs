// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pre-authored message variant tables.
//!
//! Check-ins rotate across several variants, selected deterministically per
//! entity id, to avoid a repetitive automated feel. Closing lines are fixed
//! per end reason.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use vigil_core::EndReason;

/// Follow-up check-in variants.
pub const CHECKIN_VARIANTS: &[&str] = &[
    "Hey, it's Ash. I wanted to check in after the other day -- how are you holding up?",
    "Hi, Ash here. You've been on my mind since we talked. How are things going?",
    "Hey there. Just checking in to see how you're doing today. No pressure to reply.",
    "Hi, it's Ash. Wanted to see how you've been feeling since we last spoke.",
    "Hey, checking in. How has today been treating you?",
];

/// Closing line for a session that reached a terminal state, if the reason
/// calls for one. Opt-out and hand-off endings send nothing here: opt-out
/// forbids further contact, and hand-off is announced separately.
pub fn closing_line(reason: EndReason) -> Option<&'static str> {
    match reason {
        EndReason::IdleTimeout => Some(
            "I haven't heard from you in a while, so I'll step back for now. \
             If you want to talk again, I'm here.",
        ),
        EndReason::MaxDuration => Some(
            "We've been talking for a good while, so I'm going to wrap up here. \
             Please reach out to the team any time you need to.",
        ),
        EndReason::UserEnded => Some("Okay, I'll leave you be. Take care of yourself."),
        EndReason::OptedOut
        | EndReason::HandedOff
        | EndReason::StartFailed
        | EndReason::Interrupted => None,
    }
}

/// Announcement posted to the context channel when a human takes over.
pub fn handoff_announcement(actor_id: &str) -> String {
    format!("A crisis response team member (<@{actor_id}>) has taken over this conversation.")
}

/// Pick a variant deterministically for an entity id. The same id always
/// gets the same variant; different ids spread across the table.
pub fn pick_variant<'a>(id: &str, variants: &[&'a str]) -> &'a str {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let idx = (hasher.finish() % variants.len() as u64) as usize;
    variants[idx]
}
