//! LedgerStore trait definition.
//!
//! Core trait that all durable ledger stores must implement.

use crate::bal::block::Block;
use crate::core::{Error, EventRecord, Result};
use serde::{Deserialize, Serialize};

/// Backend type identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// Embedded SQLite database file
    Sqlite,
    /// Process-local, non-durable store
    Memory,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Sqlite => write!(f, "sqlite"),
            BackendType::Memory => write!(f, "memory"),
        }
    }
}

/// Durable identity of a pending event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingId(pub i64);

impl std::fmt::Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An accepted event that is not yet part of a block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    /// Durable identity, increasing in insertion order
    pub id: PendingId,
    /// The event record
    pub record: EventRecord,
}

/// Durable storage for committed blocks and pending events.
///
/// Implementations must be thread-safe. Every method acquires and releases
/// the underlying handle itself; callers hold no connection between calls.
pub trait LedgerStore: Send + Sync {
    /// Durably append a block.
    ///
    /// The write is atomic: a partially written block is never visible.
    fn append_block(&self, block: &Block) -> Result<()>;

    /// Load every committed block in ascending index order.
    ///
    /// Fails on an unreadable record or a gap in the index sequence.
    fn load_chain(&self) -> Result<Vec<Block>>;

    /// Find a committed block by hash.
    fn block_by_hash(&self, hash: &str) -> Result<Option<Block>>;

    /// Number of committed blocks.
    fn block_count(&self) -> Result<u64>;

    /// Durably record a pending event.
    fn append_pending(&self, event: &EventRecord) -> Result<PendingId>;

    /// Load pending events in insertion order.
    fn load_pending(&self) -> Result<Vec<PendingEvent>>;

    /// Delete exactly these pending events. Unknown ids are ignored.
    fn remove_pending(&self, ids: &[PendingId]) -> Result<()>;

    /// Delete every pending event.
    fn clear_pending(&self) -> Result<()>;

    /// Append a block and delete the pending events it batched, atomically.
    fn commit_block(&self, block: &Block, batched: &[PendingId]) -> Result<()>;

    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Health check for the store.
    fn health_check(&self) -> Result<bool> {
        self.block_count().map(|_| true)
    }
}

/// Check that loaded blocks carry indexes `0..n` in order.
pub fn ensure_contiguous(blocks: &[Block]) -> Result<()> {
    for (position, block) in blocks.iter().enumerate() {
        if block.index != position as u64 {
            return Err(Error::storage(
                "load_chain",
                format!(
                    "block index {} found at position {position}; stored chain has a gap",
                    block.index
                ),
            ));
        }
    }
    Ok(())
}
