//! Ledger store implementations.
//!
//! Two backends:
//! - SQLite (durable, default)
//! - Memory

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
