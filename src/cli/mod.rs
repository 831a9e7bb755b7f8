//! Command-line interface.
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.

use crate::bal::query::EventQuery;
use crate::compliance::report::ExportFormat;
use crate::compliance::signing::ReportSigner;
use crate::core::parse_event;
use crate::ledger::config::{DEFAULT_BATCH_SIZE, DEFAULT_DIFFICULTY};
use crate::ledger::engine::AuditLedger;
use crate::storage::config::DEFAULT_DB_PATH;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "auditchain")]
#[command(about = "Tamper-evident proof-of-work audit ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Ledger database file
    #[arg(long, global = true, env = "AUDITCHAIN_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Leading zero hex digits required of every block hash
    #[arg(long, global = true, env = "AUDITCHAIN_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: u32,

    /// Pending events that trigger automatic mining
    #[arg(long, global = true, env = "AUDITCHAIN_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the ledger (and its genesis block) if it does not exist
    Init,
    /// Add one JSON event
    Add {
        /// Event as a JSON object
        #[arg(long)]
        event: String,
    },
    /// Mine pending events into a block
    Mine,
    /// Verify the whole chain
    Verify,
    /// Find committed events matching every key of a JSON object
    Search {
        #[arg(long)]
        query: String,
    },
    /// Export a compliance report for a time window
    Export {
        /// Inclusive lower bound (ISO-8601)
        #[arg(long)]
        start: String,

        /// Inclusive upper bound (ISO-8601)
        #[arg(long)]
        end: String,

        /// Report file to write
        #[arg(long)]
        output: PathBuf,

        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// Ed25519 seed file; created if missing. The report is signed when set.
        #[arg(long)]
        sign_key: Option<PathBuf>,
    },
    /// Show ledger statistics
    Stats,
}

/// What a command printed and whether it succeeded.
#[derive(Debug)]
pub struct CommandOutput {
    pub document: Value,
    pub success: bool,
}

impl CommandOutput {
    fn ok(document: Value) -> Self {
        Self {
            document,
            success: true,
        }
    }

    fn failed(document: Value) -> Self {
        Self {
            document,
            success: false,
        }
    }
}

/// Execute a parsed command line.
pub fn run(cli: Cli) -> anyhow::Result<CommandOutput> {
    let ledger = AuditLedger::initialize(&cli.db, cli.difficulty, cli.batch_size)
        .with_context(|| format!("failed to open ledger at {}", cli.db.display()))?;

    let output = match cli.command {
        Command::Init => {
            let genesis = ledger.block(0).context("ledger has no genesis block")?;
            CommandOutput::ok(json!({
                "db": cli.db,
                "total_blocks": ledger.chain_len(),
                "genesis_hash": genesis.hash,
            }))
        }
        Command::Add { event } => {
            let record = parse_event(&event)?;
            let receipt = ledger.add_event(record)?;
            CommandOutput::ok(serde_json::to_value(receipt)?)
        }
        Command::Mine => match ledger.mine_pending_block()? {
            Some(block) => CommandOutput::ok(serde_json::to_value(block)?),
            None => CommandOutput::failed(json!({
                "mined": false,
                "reason": "no pending events",
            })),
        },
        Command::Verify => {
            let verification = ledger.verify_chain();
            let success = verification.valid;
            let document = serde_json::to_value(verification)?;
            if success {
                CommandOutput::ok(document)
            } else {
                CommandOutput::failed(document)
            }
        }
        Command::Search { query } => {
            let query = EventQuery::from_json(&query)?;
            CommandOutput::ok(serde_json::to_value(ledger.search_events(&query))?)
        }
        Command::Export {
            start,
            end,
            output,
            format,
            sign_key,
        } => {
            let mut report = ledger.export_compliance_report(&start, &end);
            if let Some(key_path) = sign_key {
                let signer = ReportSigner::load_or_generate(&key_path)
                    .with_context(|| format!("failed to load signing key {}", key_path.display()))?;
                signer.sign(&mut report)?;
            }
            report.write_to(&output, format)?;

            CommandOutput::ok(json!({
                "report_id": report.report_id,
                "output": output,
                "format": format,
                "total_events": report.total_events,
                "blockchain_verified": report.blockchain_verified,
                "signed": report.is_signed(),
            }))
        }
        Command::Stats => CommandOutput::ok(serde_json::to_value(ledger.get_stats())?),
    };

    Ok(output)
}
