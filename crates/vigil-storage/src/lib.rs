// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Vigil crisis-response engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed CRUD plus
//! compare-and-transition operations for alerts, sessions, follow-ups,
//! durable timers, cooldowns, and user preferences.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

pub use database::{Database, format_ts, now_ts, parse_ts};
pub use models::*;
pub use store::SqliteStore;
