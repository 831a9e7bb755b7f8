//! Compliance reports over a time window of the audit chain.
//!
//! A report bundles the events of every block in the window with a fresh
//! integrity check, so an auditor can confirm the records were not altered.

use crate::bal::chain::{ChainInfo, ChainVerification};
use crate::bal::query::EventMatch;
use crate::core::{now_iso, Error, Result, TIMESTAMP_FIELD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Report type label.
pub const REPORT_TYPE: &str = "SecureOS Blockchain Audit Compliance Report";

/// Export format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Pretty-printed JSON document
    #[default]
    Json,
    /// One CSV row per event
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::InvalidConfig(format!(
                "unknown export format: {other} (expected json or csv)"
            ))),
        }
    }
}

/// Detached signature over a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSignature {
    /// Signature scheme, always "ed25519"
    pub algorithm: String,
    /// Hex-encoded verifying key
    pub public_key: String,
    /// Base64-encoded signature bytes
    pub signature: String,
}

/// Audit evidence for a period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Unique report id
    pub report_id: Uuid,
    /// Report type label
    pub report_type: String,
    /// Generation time (ISO-8601)
    pub generated_at: String,
    /// Inclusive lower bound on block timestamps
    pub period_start: String,
    /// Inclusive upper bound on block timestamps
    pub period_end: String,
    /// Number of events in the window
    pub total_events: u64,
    /// Whether the whole chain verified when the report was built
    pub blockchain_verified: bool,
    /// Full verification outcome
    pub verification: ChainVerification,
    /// Events of every block in the window
    pub events: Vec<EventMatch>,
    /// Chain metadata
    pub blockchain_info: ChainInfo,
    /// Signature, once signed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<ReportSignature>,
}

impl ComplianceReport {
    /// Assemble an unsigned report.
    pub fn new(
        period_start: &str,
        period_end: &str,
        events: Vec<EventMatch>,
        verification: ChainVerification,
        blockchain_info: ChainInfo,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            report_type: REPORT_TYPE.to_string(),
            generated_at: now_iso(),
            period_start: period_start.to_string(),
            period_end: period_end.to_string(),
            total_events: events.len() as u64,
            blockchain_verified: verification.valid,
            verification,
            events,
            blockchain_info,
            signature: None,
        }
    }

    /// Whether a signature is attached.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Render the report in the given format.
    pub fn render(&self, format: ExportFormat) -> Result<Vec<u8>> {
        match format {
            ExportFormat::Json => Ok(serde_json::to_vec_pretty(self)?),
            ExportFormat::Csv => Ok(self.to_csv().into_bytes()),
        }
    }

    /// Write the report to `path`.
    pub fn write_to(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let bytes = self.render(format)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, bytes)?;

        tracing::info!(
            report_id = %self.report_id,
            path = %path.display(),
            events = self.total_events,
            verified = self.blockchain_verified,
            "Compliance report exported"
        );
        Ok(())
    }

    fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("block_index,block_hash,block_timestamp,event_timestamp,event_type,event_json\n");

        for found in &self.events {
            let event_timestamp = found
                .event
                .get(TIMESTAMP_FIELD)
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let event_type = found
                .event
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let raw = serde_json::Value::Object(found.event.clone()).to_string();

            output.push_str(&format!(
                "{},{},{},{},{},{}\n",
                found.block_index,
                csv_field(&found.block_hash),
                csv_field(&found.block_timestamp),
                csv_field(event_timestamp),
                csv_field(event_type),
                csv_field(&raw)
            ));
        }

        output
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
