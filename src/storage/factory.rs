//! Store factory.
//!
//! Creates ledger stores based on configuration.

use crate::core::Result;
use crate::storage::backend::{BackendType, LedgerStore};
use crate::storage::backends::{MemoryStore, SqliteStore};
use crate::storage::config::StoreConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a ledger store from configuration.
///
/// Returns an Arc-wrapped store for shared ownership.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn LedgerStore>> {
    match config.backend {
        BackendType::Sqlite => {
            let store = SqliteStore::open(
                &config.path,
                Duration::from_millis(config.busy_timeout_ms),
            )?;
            Ok(Arc::new(store) as Arc<dyn LedgerStore>)
        }
        BackendType::Memory => Ok(Arc::new(MemoryStore::new()) as Arc<dyn LedgerStore>),
    }
}

/// Create a SQLite store at `path` with default settings (convenience function).
pub fn create_sqlite_store(path: impl Into<std::path::PathBuf>) -> Result<Arc<dyn LedgerStore>> {
    create_store(&StoreConfig::sqlite(path))
}
