//! Statement rollups: aggregation of one batch, merging of batches into the
//! accumulated total, and the read-only views derived from it.

pub mod aggregator;
pub mod merge;
pub mod models;
pub mod verify;
pub mod views;

pub use aggregator::{aggregate, BatchAggregator};
pub use merge::{fold, merge, merge_batch};
pub use models::*;
pub use verify::{check_invariants, InvariantViolation};
