//! The audit ledger.
//!
//! Buffers incoming events, mines them into blocks in batches, and keeps an
//! in-memory mirror of the committed chain backed by a durable store.
//!
//! Writers (`add_event`, `mine_pending_block`) are serialized by a single
//! mutex. Readers take a read lock on the mirrored state and never wait for
//! mining: the proof-of-work search runs outside the state lock, and the
//! mirror is only updated after the durable commit succeeds.

use crate::bal::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::bal::chain::{Chain, ChainVerification};
use crate::bal::miner::mine;
use crate::bal::query::{EventMatch, EventQuery};
use crate::compliance::report::ComplianceReport;
use crate::core::{stamp_timestamp, EventRecord, Result};
use crate::ledger::config::LedgerConfig;
use crate::storage::{create_store, LedgerStore, PendingEvent, PendingId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Outcome of accepting one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReceipt {
    /// Events still waiting for a block after this call
    pub pending_count: usize,
    /// Index of the block mined because this event filled the batch
    pub mined_block: Option<u64>,
    /// Why automatic mining failed; the event itself is still persisted
    pub mining_error: Option<String>,
}

/// Ledger statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Committed blocks, genesis included
    pub total_blocks: u64,
    /// Events across committed blocks, genesis marker included
    pub total_events: u64,
    /// Events waiting for a block
    pub pending_events: u64,
    /// Proof-of-work difficulty
    pub difficulty: u32,
    /// Events per mined block
    pub batch_size: usize,
    /// Timestamp of block 0
    pub genesis_timestamp: Option<String>,
    /// Hash of the head block
    pub latest_block_hash: Option<String>,
    /// Result of a fresh verification
    pub chain_valid: bool,
}

#[derive(Default)]
struct LedgerState {
    chain: Chain,
    pending: Vec<PendingEvent>,
}

/// Tamper-evident, batch-mined audit ledger.
pub struct AuditLedger {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
    state: RwLock<LedgerState>,
    writer: Mutex<()>,
}

impl AuditLedger {
    /// Open a ledger over an existing store handle.
    ///
    /// Loads the committed chain and pending events. An empty chain gets a
    /// freshly mined genesis block, so reopening is idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be read or written.
    pub fn open(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Result<Self> {
        config.validate()?;

        let blocks = store.load_chain()?;
        let pending = store.load_pending()?;
        let mut chain = Chain::from_blocks(blocks);

        if chain.is_empty() {
            let genesis = mine(&Block::genesis(&config.genesis_message), config.difficulty);
            store.append_block(&genesis)?;
            tracing::info!(
                hash = %genesis.hash,
                nonce = genesis.nonce,
                difficulty = config.difficulty,
                "Genesis block created"
            );
            chain.append(genesis, config.difficulty)?;
        }

        tracing::info!(
            backend = %store.backend_type(),
            blocks = chain.len(),
            pending = pending.len(),
            difficulty = config.difficulty,
            batch_size = config.batch_size,
            "Audit ledger initialized"
        );

        Ok(Self {
            store,
            config,
            state: RwLock::new(LedgerState { chain, pending }),
            writer: Mutex::new(()),
        })
    }

    /// Open a ledger from configuration, creating the configured store.
    pub fn from_config(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let store = create_store(&config.store)?;
        Self::open(store, config)
    }

    /// Open or create a SQLite-backed ledger at `path`.
    pub fn initialize(
        path: impl Into<PathBuf>,
        difficulty: u32,
        batch_size: usize,
    ) -> Result<Self> {
        let config = LedgerConfig::sqlite(path)
            .with_difficulty(difficulty)
            .with_batch_size(batch_size);
        Self::from_config(config)
    }

    /// Active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Underlying store handle.
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept an event.
    ///
    /// Stamps `timestamp` if absent, persists the event as pending, and mines
    /// a block once a full batch has accumulated. A mining failure is
    /// reported in the receipt; the event stays pending.
    ///
    /// # Errors
    ///
    /// Returns an error only if the event could not be persisted.
    pub fn add_event(&self, mut record: EventRecord) -> Result<EventReceipt> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        stamp_timestamp(&mut record);
        let id = self.store.append_pending(&record)?;

        let pending_count = {
            let mut state = self.write_state();
            state.pending.push(PendingEvent { id, record });
            state.pending.len()
        };
        tracing::debug!(%id, pending = pending_count, "Event accepted");

        let mut receipt = EventReceipt {
            pending_count,
            mined_block: None,
            mining_error: None,
        };

        if pending_count >= self.config.batch_size {
            match self.mine_locked() {
                Ok(block) => receipt.mined_block = block.map(|b| b.index),
                Err(err) => {
                    tracing::warn!(error = %err, "Automatic mining failed; events remain pending");
                    receipt.mining_error = Some(err.to_string());
                }
            }
            receipt.pending_count = self.read_state().pending.len();
        }

        Ok(receipt)
    }

    /// Mine the oldest pending events into a new block.
    ///
    /// Returns `None` when nothing is pending. At most `batch_size` events
    /// go into the block.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the commit fails. The in-memory chain and
    /// pending buffer are then unchanged.
    pub fn mine_pending_block(&self) -> Result<Option<Block>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.mine_locked()
    }

    /// Mining body; the caller holds the writer mutex.
    fn mine_locked(&self) -> Result<Option<Block>> {
        let (batch, index, previous_hash) = {
            let state = self.read_state();
            if state.pending.is_empty() {
                return Ok(None);
            }
            let take = state.pending.len().min(self.config.batch_size);
            let batch: Vec<PendingEvent> = state.pending[..take].to_vec();
            let previous_hash = state
                .chain
                .head()
                .map_or_else(|| GENESIS_PREVIOUS_HASH.to_string(), |b| b.hash.clone());
            (batch, state.chain.next_index(), previous_hash)
        };

        let ids: Vec<PendingId> = batch.iter().map(|p| p.id).collect();
        let events: Vec<EventRecord> = batch.into_iter().map(|p| p.record).collect();
        let event_count = events.len();

        let candidate = Block::candidate(index, &previous_hash, events);
        let block = mine(&candidate, self.config.difficulty);

        self.store.commit_block(&block, &ids)?;

        {
            let mut state = self.write_state();
            state.chain.append(block.clone(), self.config.difficulty)?;
            state.pending.retain(|p| !ids.contains(&p.id));
        }

        tracing::info!(
            index = block.index,
            events = event_count,
            hash = %block.hash,
            "Block committed"
        );
        Ok(Some(block))
    }

    /// Verify the committed chain, genesis included.
    pub fn verify_chain(&self) -> ChainVerification {
        self.read_state().chain.verify(self.config.difficulty)
    }

    /// Find committed events matching every key of `query`.
    ///
    /// Pending events are not searched.
    pub fn search_events(&self, query: &EventQuery) -> Vec<EventMatch> {
        self.read_state().chain.search(query)
    }

    /// Events of every block whose timestamp lies in `[start, end]`.
    pub fn events_in_time_range(&self, start: &str, end: &str) -> Vec<EventMatch> {
        self.read_state().chain.events_in_range(start, end)
    }

    /// Build a compliance report for `[start, end]`.
    ///
    /// Events, verification, and chain metadata come from one consistent
    /// snapshot.
    pub fn export_compliance_report(&self, start: &str, end: &str) -> ComplianceReport {
        let state = self.read_state();
        let events = state.chain.events_in_range(start, end);
        let verification = state.chain.verify(self.config.difficulty);
        let info = state.chain.info(self.config.difficulty);
        drop(state);

        ComplianceReport::new(start, end, events, verification, info)
    }

    /// Ledger statistics, including a fresh verification.
    pub fn get_stats(&self) -> LedgerStats {
        let state = self.read_state();
        LedgerStats {
            total_blocks: state.chain.len() as u64,
            total_events: state.chain.total_events(),
            pending_events: state.pending.len() as u64,
            difficulty: self.config.difficulty,
            batch_size: self.config.batch_size,
            genesis_timestamp: state.chain.genesis().map(|b| b.timestamp.clone()),
            latest_block_hash: state.chain.head().map(|b| b.hash.clone()),
            chain_valid: state.chain.verify(self.config.difficulty).valid,
        }
    }

    /// Committed block at `index`.
    pub fn block(&self, index: u64) -> Option<Block> {
        self.read_state().chain.get(index).cloned()
    }

    /// Committed block with the given hash.
    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.read_state().chain.get_by_hash(hash).cloned()
    }

    /// Copy of the committed chain.
    pub fn blocks(&self) -> Vec<Block> {
        self.read_state().chain.blocks().to_vec()
    }

    /// Number of committed blocks.
    pub fn chain_len(&self) -> usize {
        self.read_state().chain.len()
    }

    /// Pending events, oldest first.
    pub fn pending_events(&self) -> Vec<EventRecord> {
        self.read_state()
            .pending
            .iter()
            .map(|p| p.record.clone())
            .collect()
    }

    /// Number of pending events.
    pub fn pending_count(&self) -> usize {
        self.read_state().pending.len()
    }
}
