//! Blockchain Audit Layer (BAL)
//!
//! Tamper-evident storage format for security events:
//! - Hash-addressed event blocks
//! - Proof-of-work mining
//! - Chain integrity verification and queries

pub mod block;
pub mod canonical;
pub mod chain;
pub mod miner;
pub mod query;

pub use block::{compute_hash, Block, GENESIS_PREVIOUS_HASH};
pub use chain::{Chain, ChainInfo, ChainVerification, InvalidBlock};
pub use miner::{meets_difficulty, mine, MAX_DIFFICULTY};
pub use query::{EventMatch, EventQuery};
