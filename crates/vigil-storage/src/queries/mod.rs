// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity.

pub mod alerts;
pub mod cooldowns;
pub mod followups;
pub mod prefs;
pub mod sessions;
pub mod timers;
