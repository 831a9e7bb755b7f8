//! In-memory store implementation.
//!
//! Not durable. Useful for tests and throwaway ledgers.

use crate::bal::block::Block;
use crate::core::{Error, EventRecord, Result};
use crate::storage::backend::{BackendType, LedgerStore, PendingEvent, PendingId};
use std::sync::{PoisonError, RwLock};

#[derive(Default)]
struct MemoryState {
    blocks: Vec<Block>,
    pending: Vec<PendingEvent>,
    next_pending_id: i64,
}

impl MemoryState {
    fn push_block(&mut self, operation: &'static str, block: &Block) -> Result<()> {
        let expected = self.blocks.len() as u64;
        if block.index != expected {
            return Err(Error::storage(
                operation,
                format!("block index {} cannot be stored at position {expected}", block.index),
            ));
        }
        self.blocks.push(block.clone());
        Ok(())
    }

    fn drop_pending(&mut self, ids: &[PendingId]) {
        self.pending.retain(|p| !ids.contains(&p.id));
    }
}

/// Process-local ledger store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn append_block(&self, block: &Block) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.push_block("append_block", block)
    }

    fn load_chain(&self) -> Result<Vec<Block>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.blocks.clone())
    }

    fn block_by_hash(&self, hash: &str) -> Result<Option<Block>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.blocks.iter().find(|b| b.hash == hash).cloned())
    }

    fn block_count(&self) -> Result<u64> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.blocks.len() as u64)
    }

    fn append_pending(&self, event: &EventRecord) -> Result<PendingId> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.next_pending_id += 1;
        let id = PendingId(state.next_pending_id);
        state.pending.push(PendingEvent {
            id,
            record: event.clone(),
        });
        Ok(id)
    }

    fn load_pending(&self) -> Result<Vec<PendingEvent>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.pending.clone())
    }

    fn remove_pending(&self, ids: &[PendingId]) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.drop_pending(ids);
        Ok(())
    }

    fn clear_pending(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.pending.clear();
        Ok(())
    }

    fn commit_block(&self, block: &Block, batched: &[PendingId]) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.push_block("commit_block", block)?;
        state.drop_pending(batched);
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}
