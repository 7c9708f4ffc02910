//! `SQLite`-backed implementation of the storage contracts.
//!
//! Uses a single `Mutex<Connection>` for thread safety. One
//! [`SqliteStateStore`] implements [`SnapshotStore`] and [`ErrorRecordStore`]
//! directly; [`SqliteOffsetTracker`] layers the staged/committed offset
//! protocol on top of the same store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fluxline_types::pipeline::PipelineId;
use fluxline_types::record::ErrorRecord;
use fluxline_types::snapshot::StageOutput;
use fluxline_types::stage::StageId;
use rusqlite::Connection;

use crate::backend::{ErrorRecordStore, OffsetTracker, SnapshotStore};
use crate::error::{self, StateError};

/// Idempotent DDL for state tables.
///
/// The column is `offset_value` rather than `offset` because `OFFSET` is a
/// `SQLite` keyword.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS source_offsets (
    pipeline TEXT PRIMARY KEY,
    offset_value TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS batch_snapshots (
    pipeline TEXT PRIMARY KEY,
    snapshot_json TEXT NOT NULL,
    captured_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS error_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline TEXT NOT NULL,
    stage TEXT NOT NULL,
    record_json TEXT NOT NULL,
    error_message TEXT NOT NULL,
    failed_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_error_records_pipeline_stage
    ON error_records (pipeline, stage);
";

/// `SQLite`-backed state storage.
///
/// Create with [`SqliteStateStore::open`] for file-backed persistence or
/// [`SqliteStateStore::in_memory`] for tests.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created, or
    /// [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't be
    /// initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Read the committed offset straight from storage.
    fn load_offset(&self, pipeline: &PipelineId) -> error::Result<Option<String>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT offset_value FROM source_offsets WHERE pipeline = ?1",
            [pipeline.as_str()],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(offset) => Ok(offset),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Upsert the committed offset.
    fn save_offset(&self, pipeline: &PipelineId, offset: Option<&str>) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO source_offsets (pipeline, offset_value, updated_at) \
             VALUES (?1, ?2, datetime('now')) \
             ON CONFLICT(pipeline) \
             DO UPDATE SET offset_value = ?2, updated_at = datetime('now')",
            rusqlite::params![pipeline.as_str(), offset],
        )?;
        Ok(())
    }

    #[cfg(test)]
    fn count_error_records(&self, pipeline: &PipelineId, stage: &StageId) -> error::Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM error_records WHERE pipeline = ?1 AND stage = ?2",
            rusqlite::params![pipeline.as_str(), stage.as_str()],
            |row| row.get(0),
        )
        .map_err(StateError::from)
    }

    #[cfg(test)]
    fn first_error_message(&self, pipeline: &PipelineId) -> error::Result<String> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT error_message FROM error_records \
             WHERE pipeline = ?1 ORDER BY id LIMIT 1",
            rusqlite::params![pipeline.as_str()],
            |row| row.get(0),
        )
        .map_err(StateError::from)
    }
}

impl SnapshotStore for SqliteStateStore {
    fn exists(&self, pipeline: &PipelineId) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM batch_snapshots WHERE pipeline = ?1",
            [pipeline.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn retrieve(&self, pipeline: &PipelineId) -> error::Result<Vec<StageOutput>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT snapshot_json FROM batch_snapshots WHERE pipeline = ?1",
            [pipeline.as_str()],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StateError::SnapshotMissing(pipeline.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, pipeline: &PipelineId, snapshot: &[StageOutput]) -> error::Result<()> {
        let json = serde_json::to_string(snapshot)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO batch_snapshots (pipeline, snapshot_json, captured_at) \
             VALUES (?1, ?2, datetime('now')) \
             ON CONFLICT(pipeline) \
             DO UPDATE SET snapshot_json = ?2, captured_at = datetime('now')",
            rusqlite::params![pipeline.as_str(), json],
        )?;
        Ok(())
    }
}

impl ErrorRecordStore for SqliteStateStore {
    fn store(
        &self,
        pipeline: &PipelineId,
        errors: &BTreeMap<StageId, Vec<ErrorRecord>>,
    ) -> error::Result<u64> {
        if errors.values().all(Vec::is_empty) {
            return Ok(0);
        }

        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut stmt = tx.prepare(
            "INSERT INTO error_records \
             (pipeline, stage, record_json, error_message, failed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;

        let mut count = 0u64;
        for (stage, records) in errors {
            for record in records {
                stmt.execute(rusqlite::params![
                    pipeline.as_str(),
                    stage.as_str(),
                    serde_json::to_string(&record.record)?,
                    record.error_message,
                    record.failed_at.0,
                ])?;
                count += 1;
            }
        }
        drop(stmt);
        tx.commit()?;

        Ok(count)
    }
}

/// [`OffsetTracker`] for one pipeline backed by a [`SqliteStateStore`].
///
/// The committed offset is cached in memory (loaded once at construction,
/// refreshed only by successful commits); the staged offset lives purely in
/// memory until a commit persists it.
pub struct SqliteOffsetTracker {
    store: Arc<SqliteStateStore>,
    pipeline: PipelineId,
    offsets: Mutex<OffsetCell>,
    finished: AtomicBool,
}

#[derive(Debug, Default)]
struct OffsetCell {
    committed: Option<String>,
    staged: Option<String>,
}

impl SqliteOffsetTracker {
    /// Build a tracker for `pipeline`, loading its committed offset.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the stored offset can't be read.
    pub fn new(store: Arc<SqliteStateStore>, pipeline: PipelineId) -> error::Result<Self> {
        let committed = store.load_offset(&pipeline)?;
        Ok(Self {
            store,
            pipeline,
            offsets: Mutex::new(OffsetCell {
                committed,
                staged: None,
            }),
            finished: AtomicBool::new(false),
        })
    }

    /// Lock the offset cell, recovering from poisoning: the cell holds plain
    /// strings, so a panicked writer cannot leave it logically torn.
    fn cell(&self) -> MutexGuard<'_, OffsetCell> {
        self.offsets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OffsetTracker for SqliteOffsetTracker {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn offset(&self) -> Option<String> {
        self.cell().committed.clone()
    }

    fn set_offset(&self, offset: Option<String>) {
        self.cell().staged = offset;
    }

    fn commit_offset(&self) -> error::Result<()> {
        // Hold the cell lock across the persist so a failure leaves both the
        // staged and committed values untouched.
        let mut cell = self.cell();
        let staged = cell.staged.clone();
        self.store.save_offset(&self.pipeline, staged.as_deref())?;
        let finished = staged.is_none();
        cell.committed = staged;
        cell.staged = None;
        drop(cell);
        self.finished.store(finished, Ordering::Release);
        Ok(())
    }
}
