//! Error types for auditchain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a block failed verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Stored hash does not match the recomputed hash.
    HashMismatch { stored: String, computed: String },
    /// `previous_hash` does not point at the prior block.
    BrokenLink { expected: String, found: String },
    /// Hash lacks the required leading zero digits.
    InsufficientWork { difficulty: u32 },
    /// Block index does not match its position in the chain.
    IndexOutOfSequence { expected: u64, found: u64 },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::HashMismatch { stored, computed } => {
                write!(f, "hash mismatch (stored {stored}, computed {computed})")
            }
            Violation::BrokenLink { expected, found } => {
                write!(f, "previous_hash {found} does not match prior block hash {expected}")
            }
            Violation::InsufficientWork { difficulty } => {
                write!(f, "hash does not meet difficulty {difficulty}")
            }
            Violation::IndexOutOfSequence { expected, found } => {
                write!(f, "index {found} found where {expected} was expected")
            }
        }
    }
}

/// Errors that can occur in ledger operations.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Invalid event: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Storage errors
    #[error("Storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    // Chain errors
    #[error("Chain integrity violated at block {index} ({hash}): {violation}")]
    Integrity {
        index: u64,
        hash: String,
        violation: Violation,
    },

    #[error("Block rejected: {0}")]
    BlockRejected(String),

    // Export errors
    #[error("Signature error: {0}")]
    Signature(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a storage error for the named operation.
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Error::Storage {
            operation,
            message: message.into(),
        }
    }

    /// Whether this error came from the durable store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::storage("sqlite", err.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        Error::Signature(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_message_names_block() {
        let err = Error::Integrity {
            index: 3,
            hash: "00ab".to_string(),
            violation: Violation::InsufficientWork { difficulty: 4 },
        };
        let msg = err.to_string();
        assert!(msg.contains("block 3"));
        assert!(msg.contains("00ab"));
        assert!(msg.contains("difficulty 4"));
    }

    #[test]
    fn test_storage_helper() {
        let err = Error::storage("append_block", "disk full");
        assert!(err.is_storage());
        assert_eq!(err.to_string(), "Storage error during append_block: disk full");
    }

    #[test]
    fn test_sqlite_error_is_storage() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.is_storage());
        assert!(err.to_string().starts_with("Storage error during sqlite"));
    }

    #[test]
    fn test_violation_serializes_with_kind() {
        let v = Violation::BrokenLink {
            expected: "aa".into(),
            found: "bb".into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "broken_link");
        assert_eq!(json["found"], "bb");
    }
}
