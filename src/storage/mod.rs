//! Durable Ledger Storage
//!
//! Trait-based store for committed blocks and pending events:
//! - SQLite (WAL, full sync)
//! - Memory

pub mod backend;
pub mod backends;
pub mod config;
pub mod factory;

pub use backend::{BackendType, LedgerStore, PendingEvent, PendingId};
pub use backends::{MemoryStore, SqliteStore};
pub use config::StoreConfig;
pub use factory::{create_sqlite_store, create_store};
