//! Store configuration.
//!
//! Configuration-driven backend selection.

use crate::storage::backend::BackendType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default database file name.
pub const DEFAULT_DB_PATH: &str = "auditchain.db";

/// Default bound on waiting for the database lock.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Durable store configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type to use
    pub backend: BackendType,
    /// Database file (SQLite only)
    pub path: PathBuf,
    /// How long a storage call may wait for a lock before failing
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    /// SQLite store at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendType::Sqlite,
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Non-durable in-memory store.
    pub fn memory() -> Self {
        Self {
            backend: BackendType::Memory,
            path: PathBuf::new(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Override the lock timeout.
    pub fn with_busy_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::sqlite(DEFAULT_DB_PATH)
    }
}
