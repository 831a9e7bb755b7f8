//! Compliance Module
//!
//! Provides audit evidence export:
//! - Time-window compliance reports (JSON, CSV)
//! - Ed25519 report signatures

pub mod report;
pub mod signing;

pub use report::{ComplianceReport, ExportFormat, ReportSignature};
pub use signing::{verify_report, ReportSigner};
