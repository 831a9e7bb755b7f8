//! Audit block structure.
//!
//! Hash-addressed, immutable batches of security events.

use crate::bal::canonical::to_canonical_string;
use crate::bal::miner::meets_difficulty;
use crate::core::{now_iso, EventRecord, Result, Violation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Event type of the genesis marker event.
pub const GENESIS_EVENT_TYPE: &str = "genesis";

/// A block of security events in the audit chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, genesis is 0
    pub index: u64,
    /// Block creation time (ISO-8601)
    pub timestamp: String,
    /// Batched events, oldest first
    pub events: Vec<EventRecord>,
    /// Hash of the prior block, or "0" for genesis
    pub previous_hash: String,
    /// Proof-of-work nonce
    pub nonce: u64,
    /// Hex SHA-256 over the canonical form of the other fields
    pub hash: String,
}

impl Block {
    /// Create an unmined candidate block.
    ///
    /// The nonce starts at 0 and `hash` is the digest for that nonce.
    pub fn candidate(index: u64, previous_hash: &str, events: Vec<EventRecord>) -> Self {
        Self::with_timestamp(index, now_iso(), previous_hash, events)
    }

    /// Create an unmined candidate with an explicit timestamp.
    pub fn with_timestamp(
        index: u64,
        timestamp: String,
        previous_hash: &str,
        events: Vec<EventRecord>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            events,
            previous_hash: previous_hash.to_string(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.recompute_hash();
        block
    }

    /// Create an unmined genesis block carrying a single marker event.
    pub fn genesis(message: &str) -> Self {
        let mut marker = EventRecord::new();
        marker.insert("type".into(), Value::from(GENESIS_EVENT_TYPE));
        marker.insert("message".into(), Value::from(message));
        marker.insert("version".into(), Value::from(env!("CARGO_PKG_VERSION")));
        Self::candidate(0, GENESIS_PREVIOUS_HASH, vec![marker])
    }

    /// Whether this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Hash the block's current contents, ignoring the stored `hash`.
    pub fn recompute_hash(&self) -> String {
        compute_hash(
            self.index,
            &self.timestamp,
            &self.events,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Check this block against its parent and the proof-of-work target.
    ///
    /// Checks run in order: index sequence, stored hash, linkage, work.
    /// The first failure is returned.
    pub fn verify(
        &self,
        parent: Option<&Block>,
        difficulty: u32,
    ) -> std::result::Result<(), Violation> {
        let expected_index = parent.map_or(0, |p| p.index + 1);
        if self.index != expected_index {
            return Err(Violation::IndexOutOfSequence {
                expected: expected_index,
                found: self.index,
            });
        }

        let computed = self.recompute_hash();
        if computed != self.hash {
            return Err(Violation::HashMismatch {
                stored: self.hash.clone(),
                computed,
            });
        }

        let expected_previous = parent.map_or(GENESIS_PREVIOUS_HASH, |p| p.hash.as_str());
        if self.previous_hash != expected_previous {
            return Err(Violation::BrokenLink {
                expected: expected_previous.to_string(),
                found: self.previous_hash.clone(),
            });
        }

        if !meets_difficulty(&self.hash, difficulty) {
            return Err(Violation::InsufficientWork { difficulty });
        }

        Ok(())
    }

    /// Serialize block to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize block from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Canonical text that a block hash is computed over.
pub fn hash_preimage(
    index: u64,
    timestamp: &str,
    events: &[EventRecord],
    previous_hash: &str,
    nonce: u64,
) -> String {
    let body = json!({
        "index": index,
        "timestamp": timestamp,
        "events": events,
        "previous_hash": previous_hash,
        "nonce": nonce,
    });
    to_canonical_string(&body)
}

/// Compute a block hash (hex SHA-256 of the canonical preimage).
pub fn compute_hash(
    index: u64,
    timestamp: &str,
    events: &[EventRecord],
    previous_hash: &str,
    nonce: u64,
) -> String {
    let preimage = hash_preimage(index, timestamp, events, previous_hash, nonce);
    hex::encode(Sha256::digest(preimage.as_bytes()))
}
