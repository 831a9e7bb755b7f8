//! SQLite store implementation.
//!
//! WAL journal with full synchronous commits. Table layout matches the
//! `audit.db` files written by earlier SecureOS releases, so those can be
//! opened and verified directly.

use crate::bal::block::Block;
use crate::core::{Error, EventRecord, Result};
use crate::storage::backend::{
    ensure_contiguous, BackendType, LedgerStore, PendingEvent, PendingId,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS blocks (
    idx INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL,
    events_json TEXT NOT NULL,
    previous_hash TEXT NOT NULL,
    nonce INTEGER NOT NULL,
    hash TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS pending_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_json TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_block_hash ON blocks(hash);
CREATE INDEX IF NOT EXISTS idx_block_timestamp ON blocks(timestamp);
";

const SELECT_BLOCK: &str =
    "SELECT idx, timestamp, events_json, previous_hash, nonce, hash FROM blocks";

/// SQLite-backed ledger store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::storage("open", format!("{}: {e}", parent.display())))?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::storage("open", format!("{}: {e}", path.display())))?;
        Self::initialize_connection(&conn, busy_timeout)
            .map_err(|e| Self::classify("open", busy_timeout, e))?;

        tracing::debug!(path = %path.display(), "Opened SQLite ledger store");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
            busy_timeout,
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let busy_timeout = Duration::from_millis(crate::storage::config::DEFAULT_BUSY_TIMEOUT_MS);
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn, busy_timeout)
            .map_err(|e| Self::classify("open", busy_timeout, e))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            busy_timeout,
        })
    }

    /// Database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply pragmas and create tables.
    fn initialize_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Run `f` with the connection held for the duration of one operation.
    fn with_conn<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut conn).map_err(|e| Self::classify(operation, self.busy_timeout, e))
    }

    /// Map a SQLite error to a storage error; lock waits become timeouts.
    fn classify(operation: &'static str, busy_timeout: Duration, err: rusqlite::Error) -> Error {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                Error::storage(
                    operation,
                    format!(
                        "timed out after {} ms waiting for the database lock",
                        busy_timeout.as_millis()
                    ),
                )
            }
            _ => Error::storage(operation, err.to_string()),
        }
    }

    fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<Block> {
        let index: i64 = row.get(0)?;
        let events_json: String = row.get(2)?;
        let nonce: i64 = row.get(4)?;

        Ok(Block {
            index: u64::try_from(index)
                .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, index))?,
            timestamp: row.get(1)?,
            events: serde_json::from_str(&events_json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
            })?,
            previous_hash: row.get(3)?,
            nonce: u64::try_from(nonce)
                .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(4, nonce))?,
            hash: row.get(5)?,
        })
    }

    fn insert_block(
        conn: &Connection,
        block: &Block,
        events_json: &str,
        nonce: i64,
    ) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO blocks (idx, timestamp, events_json, previous_hash, nonce, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                block.index as i64,
                block.timestamp,
                events_json,
                block.previous_hash,
                nonce,
                block.hash,
            ],
        )?;
        Ok(())
    }

    fn delete_pending(conn: &Connection, ids: &[PendingId]) -> rusqlite::Result<usize> {
        let mut stmt = conn.prepare("DELETE FROM pending_events WHERE id = ?1")?;
        let mut removed = 0;
        for id in ids {
            removed += stmt.execute(params![id.0])?;
        }
        Ok(removed)
    }

    /// Encode the columns of a block that need conversion.
    fn encode_block(operation: &'static str, block: &Block) -> Result<(String, i64)> {
        let events_json = serde_json::to_string(&block.events)?;
        let nonce = i64::try_from(block.nonce).map_err(|_| {
            Error::storage(
                operation,
                format!("nonce {} of block {} does not fit in SQLite", block.nonce, block.index),
            )
        })?;
        Ok((events_json, nonce))
    }
}

impl LedgerStore for SqliteStore {
    fn append_block(&self, block: &Block) -> Result<()> {
        let (events_json, nonce) = Self::encode_block("append_block", block)?;
        self.with_conn("append_block", |conn| {
            Self::insert_block(conn, block, &events_json, nonce)
        })?;
        tracing::debug!(index = block.index, hash = %block.hash, "Block persisted");
        Ok(())
    }

    fn load_chain(&self) -> Result<Vec<Block>> {
        let blocks = self.with_conn("load_chain", |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_BLOCK} ORDER BY idx ASC"))?;
            let blocks = stmt
                .query_map([], Self::row_to_block)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(blocks)
        })?;
        ensure_contiguous(&blocks)?;
        Ok(blocks)
    }

    fn block_by_hash(&self, hash: &str) -> Result<Option<Block>> {
        self.with_conn("block_by_hash", |conn| {
            conn.query_row(
                &format!("{SELECT_BLOCK} WHERE hash = ?1 ORDER BY idx ASC LIMIT 1"),
                params![hash],
                Self::row_to_block,
            )
            .optional()
        })
    }

    fn block_count(&self) -> Result<u64> {
        let count: i64 = self.with_conn("block_count", |conn| {
            conn.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))
        })?;
        Ok(count as u64)
    }

    fn append_pending(&self, event: &EventRecord) -> Result<PendingId> {
        let event_json = serde_json::to_string(event)?;
        let id = self.with_conn("append_pending", |conn| {
            conn.execute(
                "INSERT INTO pending_events (event_json) VALUES (?1)",
                params![event_json],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(PendingId(id))
    }

    fn load_pending(&self) -> Result<Vec<PendingEvent>> {
        self.with_conn("load_pending", |conn| {
            let mut stmt =
                conn.prepare("SELECT id, event_json FROM pending_events ORDER BY id ASC")?;
            let pending = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let event_json: String = row.get(1)?;
                    let record = serde_json::from_str(&event_json).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?;
                    Ok(PendingEvent {
                        id: PendingId(id),
                        record,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(pending)
        })
    }

    fn remove_pending(&self, ids: &[PendingId]) -> Result<()> {
        let removed = self.with_conn("remove_pending", |conn| {
            let tx = conn.transaction()?;
            let removed = Self::delete_pending(&tx, ids)?;
            tx.commit()?;
            Ok(removed)
        })?;
        tracing::debug!(requested = ids.len(), removed, "Pending events removed");
        Ok(())
    }

    fn clear_pending(&self) -> Result<()> {
        self.with_conn("clear_pending", |conn| {
            conn.execute("DELETE FROM pending_events", [])?;
            Ok(())
        })
    }

    fn commit_block(&self, block: &Block, batched: &[PendingId]) -> Result<()> {
        let (events_json, nonce) = Self::encode_block("commit_block", block)?;
        let removed = self.with_conn("commit_block", |conn| {
            let tx = conn.transaction()?;
            Self::insert_block(&tx, block, &events_json, nonce)?;
            let removed = Self::delete_pending(&tx, batched)?;
            tx.commit()?;
            Ok(removed)
        })?;
        tracing::debug!(
            index = block.index,
            hash = %block.hash,
            removed,
            "Block committed with its batch"
        );
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bal::chain::Chain;
    use crate::bal::miner::mine;
    use crate::core::event_from_value;
    use serde_json::json;

    fn event(n: u64) -> EventRecord {
        event_from_value(json!({"type": "probe", "n": n, "score": 0.5})).unwrap()
    }

    fn genesis() -> Block {
        mine(&Block::genesis("sqlite test"), 1)
    }

    fn child(parent: &Block, events: Vec<EventRecord>) -> Block {
        mine(&Block::candidate(parent.index + 1, &parent.hash, events), 1)
    }

    #[test]
    fn test_append_and_load_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let g = genesis();
        let b1 = child(&g, vec![event(1), event(2)]);

        store.append_block(&g).unwrap();
        store.append_block(&b1).unwrap();

        let loaded = store.load_chain().unwrap();
        assert_eq!(loaded, vec![g.clone(), b1.clone()]);
        assert_eq!(loaded[1].recompute_hash(), b1.hash);
        assert_eq!(store.block_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let g = genesis();
        store.append_block(&g).unwrap();

        let err = store.append_block(&g).unwrap_err();
        assert!(err.is_storage());
        assert_eq!(store.block_count().unwrap(), 1);
    }

    #[test]
    fn test_block_by_hash() {
        let store = SqliteStore::in_memory().unwrap();
        let g = genesis();
        store.append_block(&g).unwrap();

        assert_eq!(store.block_by_hash(&g.hash).unwrap(), Some(g));
        assert_eq!(store.block_by_hash("missing").unwrap(), None);
    }

    #[test]
    fn test_pending_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let ids: Vec<_> = (0..4).map(|n| store.append_pending(&event(n)).unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        store.remove_pending(&ids[1..3]).unwrap();
        let remaining = store.load_pending().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].id, ids[0]);
        assert_eq!(remaining[0].record["n"], 0);
        assert_eq!(remaining[1].record["n"], 3);

        store.clear_pending().unwrap();
        assert!(store.load_pending().unwrap().is_empty());
    }

    #[test]
    fn test_clear_then_reinsert_remainder() {
        let store = SqliteStore::in_memory().unwrap();
        for n in 0..3 {
            store.append_pending(&event(n)).unwrap();
        }
        let all = store.load_pending().unwrap();

        store.clear_pending().unwrap();
        for pending in &all[2..] {
            store.append_pending(&pending.record).unwrap();
        }

        let reloaded = store.load_pending().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].record, all[2].record);
    }

    #[test]
    fn test_commit_block_is_atomic() {
        let store = SqliteStore::in_memory().unwrap();
        let g = genesis();
        store.append_block(&g).unwrap();

        let ids: Vec<_> = (0..3).map(|n| store.append_pending(&event(n)).unwrap()).collect();
        let b1 = child(&g, vec![event(0), event(1)]);
        store.commit_block(&b1, &ids[..2]).unwrap();

        assert_eq!(store.load_chain().unwrap().len(), 2);
        let pending = store.load_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[2]);

        // A second commit at the same index fails and removes nothing.
        let clash = child(&g, vec![event(2)]);
        assert!(store.commit_block(&clash, &ids[2..]).is_err());
        assert_eq!(store.load_pending().unwrap().len(), 1);
        assert_eq!(store.load_chain().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_events_json_is_storage_error() {
        let store = SqliteStore::in_memory().unwrap();
        store.append_block(&genesis()).unwrap();
        store
            .with_conn("test", |conn| {
                conn.execute("UPDATE blocks SET events_json = '{broken' WHERE idx = 0", [])
            })
            .unwrap();

        let err = store.load_chain().unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_gap_in_chain_is_storage_error() {
        let store = SqliteStore::in_memory().unwrap();
        let g = genesis();
        let b1 = child(&g, vec![event(1)]);
        let b2 = child(&b1, vec![event(2)]);
        store.append_block(&g).unwrap();
        store.append_block(&b2).unwrap();

        let err = store.load_chain().unwrap_err();
        assert!(err.to_string().contains("gap"));
    }

    #[test]
    fn test_reopen_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.db");
        let g = genesis();

        {
            let store = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
            store.append_block(&g).unwrap();
            store.append_pending(&event(9)).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let store = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
        assert_eq!(store.load_chain().unwrap(), vec![g]);
        assert_eq!(store.load_pending().unwrap()[0].record["n"], 9);
        assert!(store.health_check().unwrap());
    }

    #[test]
    fn test_float_events_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floats.db");
        let g = genesis();
        let scores = [12.874560591713891, 0.1, 1e-5, 1e16, 99.99999999999999];
        let events = scores
            .iter()
            .map(|s| event_from_value(json!({"type": "score", "score": s})).unwrap())
            .collect();
        let b1 = child(&g, events);

        {
            let store = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
            store.append_block(&g).unwrap();
            store.append_block(&b1).unwrap();
        }

        let store = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
        let loaded = store.load_chain().unwrap();
        assert_eq!(loaded[1], b1);
        assert_eq!(loaded[1].recompute_hash(), b1.hash);
        for (event, score) in loaded[1].events.iter().zip(scores) {
            assert_eq!(event["score"].as_f64(), Some(score));
        }
        assert!(Chain::from_blocks(loaded).verify(1).valid);
    }

    /// Rows as the SecureOS 5 Python tool writes them: `json.dumps` spacing,
    /// insertion-ordered keys, naive local timestamps, nonces searched from 1.
    const LEGACY_ROWS: [(i64, &str, &str, &str, i64, &str); 2] = [
        (
            0,
            "2026-01-01T09:30:00.123456",
            r#"[{"type": "genesis", "message": "SecureOS Blockchain Audit Log Initialized", "version": "5.0.0"}]"#,
            "0",
            4,
            "02ef3028e3cc4c60ffd8a6a51da3665c60cf43568b74b02f9f3dba8064d37564",
        ),
        (
            1,
            "2026-01-01T09:31:02.654321",
            r#"[{"type": "login", "user": "bob", "score": 12.874560591713891, "timestamp": "2026-01-01T09:31:00.000001"}, {"type": "anomaly", "ratio": 0.1, "host": "caf\u00e9", "latency": 1e-05}]"#,
            "02ef3028e3cc4c60ffd8a6a51da3665c60cf43568b74b02f9f3dba8064d37564",
            18,
            "0f7843fc982d4e5346e813962e09776600e2b521bbbb18fc08ae231a50344cd4",
        ),
    ];

    fn write_legacy_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        for (idx, timestamp, events_json, previous_hash, nonce, hash) in LEGACY_ROWS {
            conn.execute(
                "INSERT INTO blocks (idx, timestamp, events_json, previous_hash, nonce, hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, '2026-01-01 09:31:03')",
                params![idx, timestamp, events_json, previous_hash, nonce, hash],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO pending_events (event_json) VALUES (?1)",
            params![r#"{"type": "logout", "user": "bob", "duration": 3600.5}"#],
        )
        .unwrap();
    }

    #[test]
    fn test_legacy_database_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        write_legacy_db(&path);

        let store = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
        let blocks = store.load_chain().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].events[0]["user"], "bob");
        assert_eq!(blocks[1].events[1]["host"], "caf\u{e9}");
        for block in &blocks {
            assert_eq!(block.recompute_hash(), block.hash);
        }

        let verification = Chain::from_blocks(blocks).verify(1);
        assert!(verification.valid, "{verification:?}");
        assert_eq!(verification.blocks_verified, 2);

        let pending = store.load_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record["duration"], 3600.5);
    }

    #[test]
    fn test_lock_wait_reports_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.db");
        let store = SqliteStore::open(&path, Duration::from_millis(50)).unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = store.append_pending(&event(1)).unwrap_err();
        assert!(err.is_storage());
        assert!(err.to_string().contains("timed out"));

        blocker.execute_batch("ROLLBACK").unwrap();
        assert!(store.append_pending(&event(1)).is_ok());
    }
}
