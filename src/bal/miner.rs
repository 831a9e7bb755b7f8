//! Proof-of-work search.
//!
//! A block is chain-eligible once its hex hash starts with `difficulty`
//! `'0'` digits. The search is a linear scan over nonces; the lowest
//! satisfying nonce wins.

use crate::bal::block::{compute_hash, Block};
use std::time::Instant;

/// Length of a hex-encoded SHA-256 digest; no difficulty above it can be met.
pub const MAX_DIFFICULTY: u32 = 64;

/// Whether a hex digest has at least `difficulty` leading `'0'` digits.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let needed = difficulty as usize;
    hash.len() >= needed && hash.bytes().take(needed).all(|b| b == b'0')
}

/// Mine a candidate block.
///
/// Tries nonces upward from the candidate's current nonce, inclusive, and
/// returns a new block carrying the first nonce whose hash meets
/// `difficulty`. The candidate is left untouched. There is no nonce bound
/// and no cancellation point: the call returns only on success.
///
/// A fresh candidate has nonce 0, and 0 is tried first. Miners that start
/// at 1 may settle on a different nonce for the same candidate; their
/// blocks still verify, since verification only checks the stored nonce.
pub fn mine(candidate: &Block, difficulty: u32) -> Block {
    let started = Instant::now();
    let mut nonce = candidate.nonce;

    let hash = loop {
        let hash = compute_hash(
            candidate.index,
            &candidate.timestamp,
            &candidate.events,
            &candidate.previous_hash,
            nonce,
        );
        if meets_difficulty(&hash, difficulty) {
            break hash;
        }
        nonce += 1;
    };

    let attempts = nonce - candidate.nonce + 1;
    tracing::info!(
        index = candidate.index,
        nonce,
        attempts,
        elapsed_ms = started.elapsed().as_millis() as u64,
        hash = %hash,
        "Block mined"
    );

    Block {
        nonce,
        hash,
        ..candidate.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bal::block::GENESIS_PREVIOUS_HASH;
    use crate::core::event_from_value;
    use serde_json::json;

    fn fixed_genesis() -> Block {
        let marker = event_from_value(json!({
            "type": "genesis",
            "message": "Audit ledger initialized",
            "version": "0.1.0",
        }))
        .unwrap();
        Block::with_timestamp(
            0,
            "2026-01-01T00:00:00.000000Z".to_string(),
            GENESIS_PREVIOUS_HASH,
            vec![marker],
        )
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 0));
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("00ab", 3));
        assert!(!meets_difficulty("0", 2));
        assert!(meets_difficulty("", 0));
    }

    #[test]
    fn test_mine_finds_lowest_nonce() {
        let candidate = fixed_genesis();

        let mined = mine(&candidate, 1);
        assert_eq!(mined.nonce, 30);
        assert_eq!(
            mined.hash,
            "0dd872cff397ced6a5693d706d3d8c8500f093eb2bf4cc55816288ded6e1adc8"
        );

        let mined = mine(&candidate, 2);
        assert_eq!(mined.nonce, 927);
        assert_eq!(
            mined.hash,
            "005d747236914487ff22532c7ebaeeab6564c1710ca58a153131370bf6f2e6eb"
        );
    }

    #[test]
    fn test_mine_leaves_candidate_untouched() {
        let candidate = fixed_genesis();
        let before = candidate.clone();
        let mined = mine(&candidate, 2);

        assert_eq!(candidate, before);
        assert_eq!(mined.index, candidate.index);
        assert_eq!(mined.timestamp, candidate.timestamp);
        assert_eq!(mined.events, candidate.events);
        assert_eq!(mined.previous_hash, candidate.previous_hash);
    }

    #[test]
    fn test_mine_difficulty_zero_keeps_nonce() {
        let candidate = fixed_genesis();
        let mined = mine(&candidate, 0);
        assert_eq!(mined.nonce, 0);
        assert_eq!(mined.hash, candidate.hash);
    }

    #[test]
    fn test_mine_resumes_from_current_nonce() {
        let mut candidate = fixed_genesis();
        candidate.nonce = 31;
        let mined = mine(&candidate, 1);
        assert!(mined.nonce >= 31);
        assert!(mined.hash.starts_with('0'));
        assert_eq!(mined.recompute_hash(), mined.hash);
    }

    #[test]
    fn test_mined_block_verifies() {
        for difficulty in 0..=3 {
            let mined = mine(&fixed_genesis(), difficulty);
            assert!(mined.verify(None, difficulty).is_ok());
            assert!(meets_difficulty(&mined.hash, difficulty));
        }
    }
}
