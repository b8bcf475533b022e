// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `vigil-core::types` for use across
//! adapter trait boundaries. This module re-exports them for convenience
//! within the storage crate and provides row-mapping helpers.

pub use vigil_core::types::{
    Alert, AlertStatus, AshSession, CooldownEntry, EndReason, FollowupStatus, ScheduledFollowup,
    SessionMessage, SessionStatus, SessionTrigger, Severity, TimerKind, TimerRecord, TimerStatus,
};

/// Parse a stored enum column via its strum `FromStr` impl, mapping parse
/// failures to a rusqlite conversion error carrying the column index.
pub(crate) fn parse_col<T>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    raw.parse().map_err(|e: strum::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse an optional stored enum column.
pub(crate) fn parse_opt_col<T>(idx: usize, raw: Option<String>) -> Result<Option<T>, rusqlite::Error>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    raw.map(|r| parse_col(idx, r)).transpose()
}
