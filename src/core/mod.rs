//! Core utilities and common types for auditchain.

pub mod error;
pub mod types;

pub use error::{Error, Result, Violation};
pub use types::*;
