//! Common test infrastructure
//!
//! Tests only import from this module, not from its submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestLedger, JANUARY_STATEMENT};
//!
//! #[tokio::test]
//! async fn test_ingest() {
//!     let ledger = TestLedger::new();
//!     let path = ledger.write_statement("jan.csv", JANUARY_STATEMENT);
//!     ledger.manager.ingest_file(&path, None).await.unwrap();
//! }
//! ```

mod fixtures;
mod ledger;

pub use fixtures::*;
pub use ledger::TestLedger;
