// SPDX-FileCopyrightText: 2026 Vigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Vigil integration tests.
//!
//! Provides a mock chat transport, a scripted reply generator, a temp-file
//! store helper, and a full-stack [`TestHarness`].

pub mod harness;
pub mod mock_generator;
pub mod mock_transport;

use std::sync::Arc;

pub use harness::{TestHarness, TestHarnessBuilder, wait_for};
pub use mock_generator::MockGenerator;
pub use mock_transport::{MockTransport, SentDm};

use vigil_core::CrisisStore;
use vigil_storage::SqliteStore;

/// Open an initialized SQLite store on a fresh temp directory.
///
/// The returned [`tempfile::TempDir`] must be kept alive for the duration
/// of the test.
pub async fn open_test_store() -> (Arc<dyn CrisisStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = SqliteStore::new(vigil_config::model::StorageConfig {
        database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
        wal_mode: true,
    });
    store.initialize().await.expect("initialize store");
    (Arc::new(store), dir)
}
