//! Audit Ledger
//!
//! Batching, mining, and querying over a durable store:
//! - Synchronous ledger engine
//! - Async service on the blocking pool
//! - Configuration

pub mod config;
pub mod engine;
pub mod service;

pub use config::LedgerConfig;
pub use engine::{AuditLedger, EventReceipt, LedgerStats};
pub use service::LedgerService;
