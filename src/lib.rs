//! Royalty Ledger Library
//!
//! Ingests distributor royalty statements and keeps a durable, incrementally
//! merged rollup of revenue and streams per artist, track, platform,
//! territory and period.

pub mod config;
pub mod ingestion;
pub mod notifications;
pub mod rollup;
pub mod rollup_store;
pub mod sqlite_persistence;
pub mod statement;

// Re-export commonly used types for convenience
pub use ingestion::{IngestionError, IngestionManager, IngestionReport};
pub use notifications::{RollupEvent, RollupNotifier};
pub use rollup::{AccumulatedRollup, GlobalRollup, StatementBatch};
pub use rollup_store::{RollupStore, SqliteRollupStore};
