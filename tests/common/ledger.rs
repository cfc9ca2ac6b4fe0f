//! A ledger backed by a real SQLite file in a temporary directory.

use royalty_ledger::config::ROLLUP_DB_FILENAME;
use royalty_ledger::ingestion::{IngestionManager, IngestionManagerConfig};
use royalty_ledger::notifications::RollupNotifier;
use royalty_ledger::rollup_store::{RollupStore, SqliteRollupStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestLedger {
    pub manager: IngestionManager,
    pub store: Arc<dyn RollupStore>,
    keep_batch_history: bool,
    // Dropped last; removes the database and statement files.
    dir: TempDir,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::with_batch_history(true)
    }

    pub fn with_batch_history(keep_batch_history: bool) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let (store, manager) = open(dir.path(), keep_batch_history);
        Self {
            manager,
            store,
            keep_batch_history,
            dir,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join(ROLLUP_DB_FILENAME)
    }

    /// Writes a statement into the ledger's directory and returns its path.
    pub fn write_statement(&self, filename: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(filename);
        fs::write(&path, contents).expect("Failed to write statement");
        path
    }

    /// Opens a second, independent handle on the same database, as another
    /// process would.
    pub fn open_second_manager(&self) -> IngestionManager {
        open(self.dir.path(), self.keep_batch_history).1
    }

    /// Drops the store and opens the database again.
    pub fn reopen(self) -> Self {
        let Self {
            manager,
            store,
            keep_batch_history,
            dir,
        } = self;
        drop(manager);
        drop(store);
        let (store, manager) = open(dir.path(), keep_batch_history);
        Self {
            manager,
            store,
            keep_batch_history,
            dir,
        }
    }
}

fn open(dir: &Path, keep_batch_history: bool) -> (Arc<dyn RollupStore>, IngestionManager) {
    let store: Arc<dyn RollupStore> = Arc::new(
        SqliteRollupStore::new(dir.join(ROLLUP_DB_FILENAME))
            .expect("Failed to open rollup store")
            .with_batch_history(keep_batch_history),
    );
    let manager = IngestionManager::new(
        store.clone(),
        RollupNotifier::default(),
        IngestionManagerConfig::default(),
    );
    (store, manager)
}
