//! Statement ingestion pipeline.
//!
//! One ingestion runs these steps in order:
//! 1. Read the statement and decode its rows
//! 2. Aggregate the rows into a self-contained batch rollup
//! 3. Merge the batch into the accumulated rollup
//! 4. Commit batch and merged rollup in one transaction, guarded by revision
//! 5. Notify subscribers of the new revision

mod manager;
mod models;

pub use manager::{IngestionError, IngestionManager, IngestionManagerConfig};
pub use models::{IngestionReport, RebuildReport};
