//! Async facade over [`AuditLedger`].
//!
//! Every call runs on tokio's blocking pool, so proof-of-work and SQLite
//! I/O never stall the async executor. Dropping a returned future does not
//! cancel work already handed to the pool.

use crate::bal::block::Block;
use crate::bal::chain::ChainVerification;
use crate::bal::query::{EventMatch, EventQuery};
use crate::compliance::report::ComplianceReport;
use crate::core::{Error, EventRecord, Result};
use crate::ledger::engine::{AuditLedger, EventReceipt, LedgerStats};
use std::sync::Arc;

/// Shareable async handle to a ledger.
#[derive(Clone)]
pub struct LedgerService {
    ledger: Arc<AuditLedger>,
}

impl LedgerService {
    /// Wrap a ledger.
    pub fn new(ledger: AuditLedger) -> Self {
        Self {
            ledger: Arc::new(ledger),
        }
    }

    /// Wrap an already shared ledger.
    pub fn from_arc(ledger: Arc<AuditLedger>) -> Self {
        Self { ledger }
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &Arc<AuditLedger> {
        &self.ledger
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&AuditLedger) -> Result<T> + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| Error::Internal(format!("ledger task failed: {e}")))?
    }

    /// See [`AuditLedger::add_event`].
    pub async fn add_event(&self, record: EventRecord) -> Result<EventReceipt> {
        self.run(move |ledger| ledger.add_event(record)).await
    }

    /// See [`AuditLedger::mine_pending_block`].
    pub async fn mine_pending_block(&self) -> Result<Option<Block>> {
        self.run(|ledger| ledger.mine_pending_block()).await
    }

    /// See [`AuditLedger::verify_chain`].
    pub async fn verify_chain(&self) -> Result<ChainVerification> {
        self.run(|ledger| Ok(ledger.verify_chain())).await
    }

    /// See [`AuditLedger::search_events`].
    pub async fn search_events(&self, query: EventQuery) -> Result<Vec<EventMatch>> {
        self.run(move |ledger| Ok(ledger.search_events(&query))).await
    }

    /// See [`AuditLedger::events_in_time_range`].
    pub async fn events_in_time_range(&self, start: String, end: String) -> Result<Vec<EventMatch>> {
        self.run(move |ledger| Ok(ledger.events_in_time_range(&start, &end)))
            .await
    }

    /// See [`AuditLedger::export_compliance_report`].
    pub async fn export_compliance_report(
        &self,
        start: String,
        end: String,
    ) -> Result<ComplianceReport> {
        self.run(move |ledger| Ok(ledger.export_compliance_report(&start, &end)))
            .await
    }

    /// See [`AuditLedger::get_stats`].
    pub async fn get_stats(&self) -> Result<LedgerStats> {
        self.run(|ledger| Ok(ledger.get_stats())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_from_value;
    use crate::ledger::config::LedgerConfig;
    use serde_json::json;

    fn service(batch_size: usize) -> LedgerService {
        let config = LedgerConfig::memory()
            .with_difficulty(1)
            .with_batch_size(batch_size);
        LedgerService::new(AuditLedger::from_config(config).unwrap())
    }

    #[tokio::test]
    async fn test_add_and_mine() {
        let service = service(2);
        let event = event_from_value(json!({"type": "login"})).unwrap();

        let receipt = service.add_event(event.clone()).await.unwrap();
        assert_eq!(receipt.pending_count, 1);
        let receipt = service.add_event(event).await.unwrap();
        assert_eq!(receipt.mined_block, Some(1));

        assert!(service.mine_pending_block().await.unwrap().is_none());
        assert!(service.verify_chain().await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_concurrent_tasks() {
        let service = service(4);
        let mut handles = Vec::new();
        for n in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let event = event_from_value(json!({"n": n})).unwrap();
                service.add_event(event).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = service.get_stats().await.unwrap();
        assert_eq!(stats.total_blocks, 3);
        assert_eq!(stats.pending_events, 0);
        assert!(stats.chain_valid);
    }

    #[tokio::test]
    async fn test_queries() {
        let service = service(1);
        let event = event_from_value(json!({"severity": "critical"})).unwrap();
        service.add_event(event).await.unwrap();

        let found = service
            .search_events(EventQuery::new().with("severity", "critical"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let ranged = service
            .events_in_time_range("0000".into(), "9999".into())
            .await
            .unwrap();
        assert_eq!(ranged.len(), 2);

        let report = service
            .export_compliance_report("0000".into(), "9999".into())
            .await
            .unwrap();
        assert_eq!(report.total_events, 2);
        assert_eq!(service.ledger().chain_len(), 2);
    }
}
