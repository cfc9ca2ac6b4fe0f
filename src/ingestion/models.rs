use crate::rollup::StatementBatch;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of one successfully merged statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub batch_id: String,
    pub source_filename: String,
    pub rows_ingested: u64,
    pub rows_skipped: u64,
    pub unparseable_numbers: u64,
    pub currencies: BTreeSet<String>,
    pub batch_revenue: Decimal,
    pub batch_streams: u64,
    /// Revision of the accumulated rollup after the merge.
    pub revision: i64,
    /// Commit attempts, 1 unless a conflicting writer forced a retry.
    pub attempts: u32,
}

impl IngestionReport {
    pub(super) fn new(batch: &StatementBatch, revision: i64, attempts: u32) -> Self {
        Self {
            batch_id: batch.batch_id.clone(),
            source_filename: batch.source_filename.clone(),
            rows_ingested: batch.row_count,
            rows_skipped: batch.stats.rows_skipped,
            unparseable_numbers: batch.stats.unparseable_numbers,
            currencies: batch.currencies.clone(),
            batch_revenue: batch.rollup.total_revenue,
            batch_streams: batch.rollup.total_streams,
            revision,
            attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub revision: i64,
    pub batch_count: usize,
    pub total_revenue: Decimal,
    pub total_streams: u64,
}
