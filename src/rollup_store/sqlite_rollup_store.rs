use super::schema::ROLLUP_VERSIONED_SCHEMAS;
use super::{CommitResult, RollupStore, StoredBatch, ACCUMULATED_ROLLUP_KEY};
use crate::rollup::{AccumulatedRollup, BatchSummary, GlobalRollup, StatementBatch};
use crate::sqlite_persistence::{open_versioned, prepare_schema};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const BATCH_COLUMNS: &str = "batch_id, source_filename, row_count, rows_skipped, \
     unparseable_numbers, release_date_override, currencies, ingested_at, total_revenue, \
     total_streams";

/// Batch row as read from SQLite, before JSON and decimal decoding.
struct RawBatchRow {
    batch_id: String,
    source_filename: String,
    row_count: i64,
    rows_skipped: i64,
    unparseable_numbers: i64,
    release_date_override: Option<String>,
    currencies: String,
    ingested_at: i64,
    total_revenue: String,
    total_streams: i64,
    rollup: Option<String>,
    has_rollup: bool,
}

impl RawBatchRow {
    fn from_row(row: &rusqlite::Row, with_rollup: bool) -> rusqlite::Result<Self> {
        let rollup: Option<String> = if with_rollup { row.get("rollup")? } else { None };
        Ok(Self {
            batch_id: row.get("batch_id")?,
            source_filename: row.get("source_filename")?,
            row_count: row.get("row_count")?,
            rows_skipped: row.get("rows_skipped")?,
            unparseable_numbers: row.get("unparseable_numbers")?,
            release_date_override: row.get("release_date_override")?,
            currencies: row.get("currencies")?,
            ingested_at: row.get("ingested_at")?,
            total_revenue: row.get("total_revenue")?,
            total_streams: row.get("total_streams")?,
            has_rollup: row.get("has_rollup")?,
            rollup,
        })
    }

    fn into_summary(self) -> Result<(BatchSummary, Option<String>)> {
        let currencies: BTreeSet<String> = serde_json::from_str(&self.currencies)
            .with_context(|| format!("Invalid currencies for batch {}", self.batch_id))?;
        let total_revenue = Decimal::from_str(&self.total_revenue)
            .with_context(|| format!("Invalid total revenue for batch {}", self.batch_id))?;
        let summary = BatchSummary {
            batch_id: self.batch_id,
            source_filename: self.source_filename,
            row_count: self.row_count as u64,
            rows_skipped: self.rows_skipped as u64,
            unparseable_numbers: self.unparseable_numbers as u64,
            release_date_override: self.release_date_override,
            currencies,
            ingested_at: self.ingested_at,
            total_revenue,
            total_streams: self.total_streams as u64,
            has_rollup: self.has_rollup,
        };
        Ok((summary, self.rollup))
    }

    fn into_stored(self) -> Result<StoredBatch> {
        let (summary, rollup_json) = self.into_summary()?;
        let rollup = match rollup_json {
            Some(json) => Some(
                serde_json::from_str::<GlobalRollup>(&json)
                    .with_context(|| format!("Invalid rollup for batch {}", summary.batch_id))?,
            ),
            None => None,
        };
        Ok(StoredBatch { summary, rollup })
    }
}

pub struct SqliteRollupStore {
    conn: Arc<Mutex<Connection>>,
    keep_batch_history: bool,
}

impl SqliteRollupStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, ROLLUP_VERSIONED_SCHEMAS, "rollup")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            keep_batch_history: true,
        })
    }

    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        prepare_schema(&mut conn, ROLLUP_VERSIONED_SCHEMAS, true, "rollup")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            keep_batch_history: true,
        })
    }

    /// When disabled, batches are logged without their rollup payload.
    pub fn with_batch_history(mut self, keep: bool) -> Self {
        self.keep_batch_history = keep;
        self
    }

    fn read_revision(tx: &Transaction) -> Result<i64> {
        let revision: Option<i64> = tx
            .query_row(
                "SELECT revision FROM rollup_state WHERE key = ?1",
                params![ACCUMULATED_ROLLUP_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(revision.unwrap_or(0))
    }

    fn write_accumulated(tx: &Transaction, revision: i64, rollup: &GlobalRollup) -> Result<()> {
        let value = serde_json::to_string(rollup).context("Failed to serialize rollup")?;
        tx.execute(
            "INSERT INTO rollup_state (key, value, revision, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET value = ?2, revision = ?3, updated_at = ?4",
            params![
                ACCUMULATED_ROLLUP_KEY,
                value,
                revision,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn insert_batch(&self, tx: &Transaction, batch: &StatementBatch) -> Result<()> {
        let currencies = serde_json::to_string(&batch.currencies)?;
        let rollup = if self.keep_batch_history {
            Some(serde_json::to_string(&batch.rollup).context("Failed to serialize batch rollup")?)
        } else {
            None
        };
        tx.execute(
            "INSERT INTO statement_batches (batch_id, source_filename, row_count, rows_skipped,
                 unparseable_numbers, release_date_override, currencies, ingested_at,
                 total_revenue, total_streams, rollup)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                batch.batch_id,
                batch.source_filename,
                batch.row_count as i64,
                batch.stats.rows_skipped as i64,
                batch.stats.unparseable_numbers as i64,
                batch.release_date_override,
                currencies,
                batch.ingested_at,
                batch.rollup.total_revenue.to_string(),
                batch.rollup.total_streams as i64,
                rollup,
            ],
        )
        .with_context(|| format!("Failed to log batch {}", batch.batch_id))?;
        Ok(())
    }
}

impl RollupStore for SqliteRollupStore {
    fn load_accumulated(&self) -> Result<AccumulatedRollup> {
        let conn = self.conn.lock().unwrap();
        let stored: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT value, revision, updated_at FROM rollup_state WHERE key = ?1",
                params![ACCUMULATED_ROLLUP_KEY],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match stored {
            Some((value, revision, updated_at)) => {
                let rollup: GlobalRollup = serde_json::from_str(&value)
                    .context("Failed to deserialize accumulated rollup")?;
                Ok(AccumulatedRollup {
                    revision,
                    rollup,
                    updated_at: Some(updated_at),
                })
            }
            None => Ok(AccumulatedRollup::default()),
        }
    }

    fn commit_merge(
        &self,
        expected_revision: i64,
        batch: &StatementBatch,
        merged: &GlobalRollup,
    ) -> Result<CommitResult> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current_revision = Self::read_revision(&tx)?;
        if current_revision != expected_revision {
            warn!(
                "Rejecting merge of batch {}: expected revision {}, found {}",
                batch.batch_id, expected_revision, current_revision
            );
            return Ok(CommitResult::Conflict { current_revision });
        }

        let revision = current_revision + 1;
        self.insert_batch(&tx, batch)?;
        Self::write_accumulated(&tx, revision, merged)?;
        tx.commit().context("Failed to commit merge")?;

        debug!("Committed batch {} at revision {}", batch.batch_id, revision);
        Ok(CommitResult::Committed { revision })
    }

    fn replace_accumulated(&self, expected_revision: i64, rollup: &GlobalRollup) -> Result<CommitResult> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current_revision = Self::read_revision(&tx)?;
        if current_revision != expected_revision {
            return Ok(CommitResult::Conflict { current_revision });
        }

        let revision = current_revision + 1;
        Self::write_accumulated(&tx, revision, rollup)?;
        tx.commit().context("Failed to commit rollup replacement")?;
        Ok(CommitResult::Committed { revision })
    }

    fn list_batches(&self, limit: usize) -> Result<Vec<BatchSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, rollup IS NOT NULL AS has_rollup FROM statement_batches
             ORDER BY ingested_at DESC, rowid DESC LIMIT ?1",
            BATCH_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| RawBatchRow::from_row(row, false))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|raw| raw.into_summary().map(|(summary, _)| summary))
            .collect()
    }

    fn get_batch(&self, batch_id: &str) -> Result<Option<StoredBatch>> {
        let conn = self.conn.lock().unwrap();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {}, rollup, rollup IS NOT NULL AS has_rollup FROM statement_batches
                     WHERE batch_id = ?1",
                    BATCH_COLUMNS
                ),
                params![batch_id],
                |row| RawBatchRow::from_row(row, true),
            )
            .optional()?;
        raw.map(RawBatchRow::into_stored).transpose()
    }

    fn load_batch_log(&self) -> Result<Vec<StoredBatch>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, rollup, rollup IS NOT NULL AS has_rollup FROM statement_batches
             ORDER BY ingested_at ASC, rowid ASC",
            BATCH_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], |row| RawBatchRow::from_row(row, true))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawBatchRow::into_stored).collect()
    }

    fn batch_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM statement_batches", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}
