//! Durable storage for the accumulated rollup and the statement batch log.

mod schema;
mod sqlite_rollup_store;

pub use schema::ROLLUP_VERSIONED_SCHEMAS;
pub use sqlite_rollup_store::SqliteRollupStore;

use crate::rollup::{AccumulatedRollup, BatchSummary, GlobalRollup, StatementBatch};
use crate::statement::DecodeStats;
use anyhow::Result;

/// Key of the accumulated rollup in the `rollup_state` table.
pub const ACCUMULATED_ROLLUP_KEY: &str = "accumulated_rollup";

/// Outcome of an optimistic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Committed { revision: i64 },
    /// The stored revision moved since it was read; nothing was written.
    Conflict { current_revision: i64 },
}

/// A batch log entry as stored. The rollup is absent when the batch was
/// logged with history disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBatch {
    pub summary: BatchSummary,
    pub rollup: Option<GlobalRollup>,
}

impl StoredBatch {
    pub fn into_batch(self) -> Option<StatementBatch> {
        let rollup = self.rollup?;
        let summary = self.summary;
        Some(StatementBatch {
            batch_id: summary.batch_id,
            source_filename: summary.source_filename,
            row_count: summary.row_count,
            stats: DecodeStats {
                rows_read: summary.row_count + summary.rows_skipped,
                rows_skipped: summary.rows_skipped,
                unparseable_numbers: summary.unparseable_numbers,
            },
            release_date_override: summary.release_date_override,
            currencies: summary.currencies,
            ingested_at: summary.ingested_at,
            rollup,
        })
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait RollupStore: Send + Sync {
    /// Current accumulated rollup, revision 0 and empty if nothing was merged yet.
    fn load_accumulated(&self) -> Result<AccumulatedRollup>;

    /// Atomically appends `batch` to the log and replaces the accumulated
    /// rollup with `merged`, provided the stored revision still equals
    /// `expected_revision`.
    fn commit_merge(
        &self,
        expected_revision: i64,
        batch: &StatementBatch,
        merged: &GlobalRollup,
    ) -> Result<CommitResult>;

    /// Replaces the accumulated rollup without touching the log.
    fn replace_accumulated(&self, expected_revision: i64, rollup: &GlobalRollup) -> Result<CommitResult>;

    // Batch log
    /// Newest first.
    fn list_batches(&self, limit: usize) -> Result<Vec<BatchSummary>>;
    fn get_batch(&self, batch_id: &str) -> Result<Option<StoredBatch>>;
    /// Every logged batch, oldest first.
    fn load_batch_log(&self) -> Result<Vec<StoredBatch>>;
    fn batch_count(&self) -> Result<usize>;
}
