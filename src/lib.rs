//! # auditchain - Tamper-Evident Audit Ledger
//!
//! An append-only log of security events providing:
//! - **BAL**: Blockchain Audit Layer (hash-linked, proof-of-work blocks)
//! - **Storage**: durable SQLite store for blocks and pending events
//! - **Ledger**: batching, mining, verification, and queries
//! - **Compliance**: signed time-window reports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use auditchain::core::parse_event;
//! use auditchain::ledger::AuditLedger;
//!
//! fn main() -> auditchain::Result<()> {
//!     let ledger = AuditLedger::initialize("audit.db", 4, 100)?;
//!     ledger.add_event(parse_event(r#"{"type": "login", "user": "alice"}"#)?)?;
//!     ledger.mine_pending_block()?;
//!     assert!(ledger.verify_chain().valid);
//!     Ok(())
//! }
//! ```

pub mod bal;
pub mod cli;
pub mod compliance;
pub mod core;
pub mod ledger;
#[cfg(feature = "python")]
pub mod python;
pub mod storage;

pub use core::error::{Error, Result};
pub use ledger::{AuditLedger, LedgerConfig, LedgerService};
