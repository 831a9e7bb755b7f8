//! In-memory mirror of the committed audit chain.
//!
//! Append-only; every block links to its predecessor by hash.

use crate::bal::block::Block;
use crate::bal::query::{EventMatch, EventQuery};
use crate::core::{Error, Result, Violation};
use serde::{Deserialize, Serialize};

/// Chain metadata carried in reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Number of committed blocks, genesis included
    pub total_blocks: u64,
    /// Proof-of-work difficulty the chain is checked against
    pub difficulty: u32,
    /// Hash of block 0
    pub genesis_hash: Option<String>,
    /// Hash of the head block
    pub latest_hash: Option<String>,
}

/// The first block that failed verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvalidBlock {
    /// Index of the failing block
    pub index: u64,
    /// Stored hash of the failing block
    pub hash: String,
    /// What was wrong with it
    pub violation: Violation,
}

/// Result of chain verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Whether the chain is valid
    pub valid: bool,
    /// Number of blocks that passed before the first failure
    pub blocks_verified: u64,
    /// First failing block (if any)
    pub first_invalid: Option<InvalidBlock>,
}

impl ChainVerification {
    /// Convert a failed verification into an integrity error.
    pub fn into_result(self) -> Result<Self> {
        match self.first_invalid {
            Some(InvalidBlock {
                index,
                hash,
                violation,
            }) => Err(Error::Integrity {
                index,
                hash,
                violation,
            }),
            None => Ok(self),
        }
    }
}

/// Ordered, append-only sequence of blocks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap blocks loaded from storage, in ascending index order.
    ///
    /// Contents are not verified here; call [`Chain::verify`].
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the chain has no blocks (not even genesis).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get the genesis block.
    pub fn genesis(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Get the head block.
    pub fn head(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Index the next appended block must carry.
    pub fn next_index(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Get block by index.
    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Get block by hash.
    pub fn get_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// Get all blocks.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Append a mined block.
    ///
    /// The block must extend the current head and meet `difficulty`.
    pub fn append(&mut self, block: Block, difficulty: u32) -> Result<()> {
        block
            .verify(self.head(), difficulty)
            .map_err(|violation| {
                Error::BlockRejected(format!("block {}: {violation}", block.index))
            })?;
        self.blocks.push(block);
        Ok(())
    }

    /// Verify entire chain integrity.
    ///
    /// Stops at the first failing block; nothing is repaired.
    pub fn verify(&self, difficulty: u32) -> ChainVerification {
        let mut verification = ChainVerification {
            valid: true,
            blocks_verified: 0,
            first_invalid: None,
        };

        for (i, block) in self.blocks.iter().enumerate() {
            let parent = if i > 0 { Some(&self.blocks[i - 1]) } else { None };

            if let Err(violation) = block.verify(parent, difficulty) {
                tracing::warn!(
                    index = block.index,
                    hash = %block.hash,
                    %violation,
                    "Chain verification failed"
                );
                verification.valid = false;
                verification.first_invalid = Some(InvalidBlock {
                    index: block.index,
                    hash: block.hash.clone(),
                    violation,
                });
                break;
            }

            verification.blocks_verified += 1;
        }

        verification
    }

    /// Find events matching a query, in chain order then in-block order.
    pub fn search(&self, query: &EventQuery) -> Vec<EventMatch> {
        self.blocks
            .iter()
            .flat_map(|block| {
                block
                    .events
                    .iter()
                    .filter(|event| query.matches(event))
                    .map(move |event| EventMatch::new(block, event))
            })
            .collect()
    }

    /// All events of blocks whose timestamp lies in `[start, end]`.
    ///
    /// Bounds compare lexically, which orders ISO-8601 strings correctly.
    pub fn events_in_range(&self, start: &str, end: &str) -> Vec<EventMatch> {
        self.blocks
            .iter()
            .filter(|block| start <= block.timestamp.as_str() && block.timestamp.as_str() <= end)
            .flat_map(|block| block.events.iter().map(move |event| EventMatch::new(block, event)))
            .collect()
    }

    /// Total events across all blocks.
    pub fn total_events(&self) -> u64 {
        self.blocks.iter().map(|b| b.events.len() as u64).sum()
    }

    /// Chain metadata.
    pub fn info(&self, difficulty: u32) -> ChainInfo {
        ChainInfo {
            total_blocks: self.blocks.len() as u64,
            difficulty,
            genesis_hash: self.genesis().map(|b| b.hash.clone()),
            latest_hash: self.head().map(|b| b.hash.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bal::miner::mine;
    use crate::core::{event_from_value, EventRecord};
    use serde_json::{json, Value};

    const DIFFICULTY: u32 = 1;

    fn event(value: Value) -> EventRecord {
        event_from_value(value).unwrap()
    }

    fn next_block(chain: &Chain, timestamp: &str, events: Vec<EventRecord>) -> Block {
        let previous = chain.head().map_or("0".to_string(), |b| b.hash.clone());
        let candidate =
            Block::with_timestamp(chain.next_index(), timestamp.to_string(), &previous, events);
        mine(&candidate, DIFFICULTY)
    }

    fn sample_chain() -> Chain {
        let mut chain = Chain::new();
        let mut genesis = Block::genesis("test");
        genesis.timestamp = "2025-12-31T00:00:00.000000Z".to_string();
        let genesis = mine(&genesis, DIFFICULTY);
        chain.append(genesis, DIFFICULTY).unwrap();

        let b1 = next_block(
            &chain,
            "2026-01-01T10:00:00.000000Z",
            vec![
                event(json!({"type": "login", "severity": "info"})),
                event(json!({"type": "malware", "severity": "critical"})),
            ],
        );
        chain.append(b1, DIFFICULTY).unwrap();

        let b2 = next_block(
            &chain,
            "2026-01-02T10:00:00.000000Z",
            vec![event(json!({"type": "intrusion", "severity": "critical"}))],
        );
        chain.append(b2, DIFFICULTY).unwrap();
        chain
    }

    #[test]
    fn test_append_and_lookup() {
        let chain = sample_chain();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.next_index(), 3);
        assert_eq!(chain.get(1).unwrap().index, 1);
        assert!(chain.get(99).is_none());

        let head = chain.head().unwrap();
        assert_eq!(chain.get_by_hash(&head.hash).unwrap().index, 2);
        assert!(chain.get_by_hash("nope").is_none());
    }

    #[test]
    fn test_append_rejects_unlinked_block() {
        let mut chain = sample_chain();
        let candidate = Block::with_timestamp(3, "t".into(), "ffff", vec![]);
        let block = mine(&candidate, DIFFICULTY);

        let err = chain.append(block, DIFFICULTY).unwrap_err();
        assert!(matches!(err, Error::BlockRejected(_)));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_verify_valid_chain() {
        let chain = sample_chain();
        let verification = chain.verify(DIFFICULTY);
        assert!(verification.valid);
        assert_eq!(verification.blocks_verified, 3);
        assert!(verification.first_invalid.is_none());
        assert!(verification.into_result().is_ok());
    }

    #[test]
    fn test_verify_reports_first_tampered_block() {
        let chain = sample_chain();
        let mut blocks = chain.blocks().to_vec();
        blocks[1].events[0].insert("severity".into(), json!("low"));
        let tampered = Chain::from_blocks(blocks);

        let verification = tampered.verify(DIFFICULTY);
        assert!(!verification.valid);
        assert_eq!(verification.blocks_verified, 1);

        let invalid = verification.first_invalid.clone().unwrap();
        assert_eq!(invalid.index, 1);
        assert!(matches!(invalid.violation, Violation::HashMismatch { .. }));

        let err = verification.into_result().unwrap_err();
        assert!(matches!(err, Error::Integrity { index: 1, .. }));
    }

    #[test]
    fn test_verify_detects_higher_difficulty() {
        let chain = sample_chain();
        // Blocks mined at difficulty 1 almost never meet 8.
        let verification = chain.verify(8);
        assert!(!verification.valid);
        assert!(matches!(
            verification.first_invalid.unwrap().violation,
            Violation::InsufficientWork { difficulty: 8 }
        ));
    }

    #[test]
    fn test_search_order() {
        let chain = sample_chain();
        let results = chain.search(&EventQuery::new().with("severity", "critical"));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].block_index, 1);
        assert_eq!(results[0].event["type"], "malware");
        assert_eq!(results[1].block_index, 2);
        assert_eq!(results[1].block_hash, chain.get(2).unwrap().hash);
    }

    #[test]
    fn test_events_in_range_is_block_granular() {
        let chain = sample_chain();

        let day_one = chain.events_in_range("2026-01-01", "2026-01-01T23:59:59");
        assert_eq!(day_one.len(), 2);
        assert!(day_one.iter().all(|m| m.block_index == 1));

        let both = chain.events_in_range("2026-01-01", "2026-01-03");
        assert_eq!(both.len(), 3);

        let inclusive =
            chain.events_in_range("2026-01-02T10:00:00.000000Z", "2026-01-02T10:00:00.000000Z");
        assert_eq!(inclusive.len(), 1);

        assert!(chain.events_in_range("2030-01-01", "2031-01-01").is_empty());
    }

    #[test]
    fn test_info_and_totals() {
        let chain = sample_chain();
        assert_eq!(chain.total_events(), 4);

        let info = chain.info(DIFFICULTY);
        assert_eq!(info.total_blocks, 3);
        assert_eq!(info.genesis_hash, Some(chain.genesis().unwrap().hash.clone()));
        assert_eq!(info.latest_hash, Some(chain.head().unwrap().hash.clone()));

        let empty = Chain::new().info(DIFFICULTY);
        assert_eq!(empty.total_blocks, 0);
        assert!(empty.genesis_hash.is_none());
    }
}
