//! Ledger configuration.

use crate::bal::miner::MAX_DIFFICULTY;
use crate::core::{Error, Result};
use crate::storage::config::StoreConfig;
use serde::{Deserialize, Serialize};

/// Default proof-of-work difficulty (leading zero hex digits).
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Default number of events per block.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Message carried by the genesis marker event.
pub const DEFAULT_GENESIS_MESSAGE: &str = "Audit ledger initialized";

/// Audit ledger configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every block hash
    pub difficulty: u32,
    /// Pending events that trigger automatic mining
    pub batch_size: usize,
    /// Genesis marker message, used only when the chain is created
    pub genesis_message: String,
    /// Durable store settings
    pub store: StoreConfig,
}

impl LedgerConfig {
    /// Config for a SQLite ledger at `path`.
    pub fn sqlite(path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: StoreConfig::sqlite(path),
            ..Default::default()
        }
    }

    /// Config for a throwaway in-memory ledger.
    pub fn memory() -> Self {
        Self {
            store: StoreConfig::memory(),
            ..Default::default()
        }
    }

    /// Set the difficulty.
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Reject settings the ledger cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(Error::InvalidConfig(format!(
                "difficulty {} exceeds the maximum of {MAX_DIFFICULTY}",
                self.difficulty
            )));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            batch_size: DEFAULT_BATCH_SIZE,
            genesis_message: DEFAULT_GENESIS_MESSAGE.to_string(),
            store: StoreConfig::default(),
        }
    }
}
