//! Ingestion Manager - turns statement files into committed rollup revisions.

use super::models::{IngestionReport, RebuildReport};
use crate::notifications::{RollupEvent, RollupNotifier};
use crate::rollup::{
    fold, merge_batch, AccumulatedRollup, BatchAggregator, StatementBatch, DEFAULT_TOP_ARTISTS,
};
use crate::rollup_store::{CommitResult, RollupStore};
use crate::statement::{read_statement, StatementError};
use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Statement(#[from] StatementError),

    #[error("Invalid release date {0:?}, expected YYYY-MM-DD")]
    InvalidReleaseDate(String),

    #[error("Concurrent merge conflict: expected revision {expected}, found {actual}")]
    ConcurrentMergeConflict { expected: i64, actual: i64 },

    #[error("Batch {0} was logged without its rollup, the log cannot be replayed")]
    MissingBatchRollup(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Store task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
}

impl IngestionError {
    /// True when running the same ingestion again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestionError::ConcurrentMergeConflict { .. })
    }
}

#[derive(Debug, Clone)]
pub struct IngestionManagerConfig {
    /// Size of the derived top-artists list.
    pub top_artists_count: usize,
    /// Extra commit attempts after a revision conflict.
    pub max_conflict_retries: u32,
}

impl Default for IngestionManagerConfig {
    fn default() -> Self {
        Self {
            top_artists_count: DEFAULT_TOP_ARTISTS,
            max_conflict_retries: 3,
        }
    }
}

/// Orchestrates parse, aggregate, merge, commit and notify.
///
/// Merges in this process are serialized by `merge_lock`; writers in other
/// processes are caught by the store's revision check and surface as
/// [`IngestionError::ConcurrentMergeConflict`]. Store calls block, so the
/// read-merge-commit step runs on tokio's blocking pool.
pub struct IngestionManager {
    store: Arc<dyn RollupStore>,
    notifier: RollupNotifier,
    config: IngestionManagerConfig,
    merge_lock: Mutex<()>,
}

fn validate_release_date(release_date: Option<&str>) -> Result<Option<String>, IngestionError> {
    match release_date.map(str::trim) {
        None | Some("") => Ok(None),
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|_| Some(date.to_string()))
            .map_err(|_| IngestionError::InvalidReleaseDate(date.to_string())),
    }
}

impl IngestionManager {
    pub fn new(
        store: Arc<dyn RollupStore>,
        notifier: RollupNotifier,
        config: IngestionManagerConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            merge_lock: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &RollupNotifier {
        &self.notifier
    }

    pub fn store(&self) -> &Arc<dyn RollupStore> {
        &self.store
    }

    /// Parses and aggregates one statement without touching the store.
    pub fn build_batch(
        &self,
        source_filename: &str,
        data: &[u8],
        release_date_override: Option<&str>,
    ) -> Result<StatementBatch, IngestionError> {
        let release_date_override = validate_release_date(release_date_override)?;

        let mut aggregator = BatchAggregator::new(self.config.top_artists_count);
        let stats = read_statement(data, release_date_override.as_deref(), |row| {
            aggregator.push(row)
        })?;

        Ok(aggregator.finish(
            uuid::Uuid::new_v4().to_string(),
            source_filename,
            stats,
            release_date_override,
            Utc::now().timestamp_millis(),
        ))
    }

    /// Merges an already built batch into the accumulated rollup. Fails with
    /// a retryable conflict if another writer committed in between.
    pub async fn commit_batch(&self, batch: &StatementBatch) -> Result<IngestionReport, IngestionError> {
        self.commit_batch_attempt(Arc::new(batch.clone()), 1).await
    }

    /// Runs `work` against the store on the blocking pool.
    async fn with_store<T, F>(&self, work: F) -> Result<T, IngestionError>
    where
        F: FnOnce(&dyn RollupStore) -> Result<T, IngestionError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || work(store.as_ref())).await?
    }

    async fn commit_batch_attempt(
        &self,
        batch: Arc<StatementBatch>,
        attempt: u32,
    ) -> Result<IngestionReport, IngestionError> {
        let _guard = self.merge_lock.lock().await;

        let top_artists_count = self.config.top_artists_count;
        let merging = Arc::clone(&batch);
        let (previous_revision, merged, outcome) = self
            .with_store(move |store| {
                let previous = store.load_accumulated()?;
                let merged = merge_batch(&previous, &merging, top_artists_count).rollup;
                let outcome = store.commit_merge(previous.revision, &merging, &merged)?;
                Ok((previous.revision, merged, outcome))
            })
            .await?;

        match outcome {
            CommitResult::Committed { revision } => {
                info!(
                    "Ingested {} as batch {}: {} rows, {} skipped, {} unparseable numbers, revenue {} (revision {})",
                    batch.source_filename,
                    batch.batch_id,
                    batch.row_count,
                    batch.stats.rows_skipped,
                    batch.stats.unparseable_numbers,
                    batch.rollup.total_revenue,
                    revision
                );
                self.notifier.notify(RollupEvent::AccumulatedRollupChanged {
                    revision,
                    batch_id: batch.batch_id.clone(),
                    total_revenue: merged.total_revenue,
                    total_streams: merged.total_streams,
                    changed_at: Utc::now().timestamp_millis(),
                });
                Ok(IngestionReport::new(&batch, revision, attempt))
            }
            CommitResult::Conflict { current_revision } => {
                warn!(
                    "Merge of batch {} conflicted: read revision {}, store is at {}",
                    batch.batch_id, previous_revision, current_revision
                );
                Err(IngestionError::ConcurrentMergeConflict {
                    expected: previous_revision,
                    actual: current_revision,
                })
            }
        }
    }

    /// Ingests one statement held in memory. A conflicting writer is reported
    /// as an error, see [`Self::ingest_bytes_retrying`].
    pub async fn ingest_bytes(
        &self,
        source_filename: &str,
        data: &[u8],
        release_date_override: Option<&str>,
    ) -> Result<IngestionReport, IngestionError> {
        let batch = self.build_batch(source_filename, data, release_date_override)?;
        self.commit_batch(&batch).await
    }

    /// Like [`Self::ingest_bytes`], but re-merges the same batch against the
    /// fresh state after a conflict, up to `max_conflict_retries` times.
    pub async fn ingest_bytes_retrying(
        &self,
        source_filename: &str,
        data: &[u8],
        release_date_override: Option<&str>,
    ) -> Result<IngestionReport, IngestionError> {
        let batch = Arc::new(self.build_batch(source_filename, data, release_date_override)?);
        let mut attempt = 1;
        loop {
            match self.commit_batch_attempt(Arc::clone(&batch), attempt).await {
                Err(e) if e.is_retryable() && attempt <= self.config.max_conflict_retries => {
                    warn!("Retrying batch {} after conflict (attempt {})", batch.batch_id, attempt);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub async fn ingest_file(
        &self,
        path: &Path,
        release_date_override: Option<&str>,
    ) -> Result<IngestionReport, IngestionError> {
        let data = tokio::fs::read(path).await?;
        let source_filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest_bytes_retrying(&source_filename, &data, release_date_override)
            .await
    }

    /// Recomputes the accumulated rollup by folding the whole batch log and
    /// atomically replaces the stored one.
    pub async fn rebuild_from_log(&self) -> Result<RebuildReport, IngestionError> {
        let _guard = self.merge_lock.lock().await;

        let top_artists_count = self.config.top_artists_count;
        let (previous, batch_count, rebuilt, outcome) = self
            .with_store(move |store| {
                let previous = store.load_accumulated()?;
                let log = store.load_batch_log()?;

                let mut rollups = Vec::with_capacity(log.len());
                for stored in &log {
                    match &stored.rollup {
                        Some(rollup) => rollups.push(rollup),
                        None => {
                            return Err(IngestionError::MissingBatchRollup(
                                stored.summary.batch_id.clone(),
                            ))
                        }
                    }
                }
                let rebuilt = fold(rollups, top_artists_count);
                let outcome = store.replace_accumulated(previous.revision, &rebuilt)?;
                Ok((previous, log.len(), rebuilt, outcome))
            })
            .await?;

        match outcome {
            CommitResult::Committed { revision } => {
                if rebuilt != previous.rollup {
                    warn!(
                        "Rebuilt rollup differs from the stored one (stored revenue {}, rebuilt {})",
                        previous.rollup.total_revenue, rebuilt.total_revenue
                    );
                }
                info!(
                    "Rebuilt accumulated rollup from {} batches (revision {})",
                    batch_count, revision
                );
                self.notifier.notify(RollupEvent::AccumulatedRollupRebuilt {
                    revision,
                    batch_count,
                    total_revenue: rebuilt.total_revenue,
                    changed_at: Utc::now().timestamp_millis(),
                });
                Ok(RebuildReport {
                    revision,
                    batch_count,
                    total_revenue: rebuilt.total_revenue,
                    total_streams: rebuilt.total_streams,
                })
            }
            CommitResult::Conflict { current_revision } => {
                Err(IngestionError::ConcurrentMergeConflict {
                    expected: previous.revision,
                    actual: current_revision,
                })
            }
        }
    }

    pub fn accumulated(&self) -> Result<AccumulatedRollup, IngestionError> {
        Ok(self.store.load_accumulated()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollup::GlobalRollup;
    use crate::rollup_store::{MockRollupStore, SqliteRollupStore};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const JANUARY: &str = "Artist;Track Title;ISRC;Store;Country;Period;Quantity;Label Share Net Receipts\n\
                           Luna;A;X1;Spotify;ES;2024M01;100;10,50\n\
                           ;;;;;;;\n";
    const FEBRUARY: &str = "Artist,Track,ISRC,DSP,Territory,Period,Streams,Revenue\n\
                            Luna,A,X1,Spotify,ES,2024M01,50,5.25\n";

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sqlite_manager() -> IngestionManager {
        IngestionManager::new(
            Arc::new(SqliteRollupStore::in_memory().unwrap()),
            RollupNotifier::default(),
            IngestionManagerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_ingest_two_statements() {
        let manager = sqlite_manager();
        let mut events = manager.notifier().subscribe();

        let first = manager
            .ingest_bytes("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(first.rows_ingested, 1);
        assert_eq!(first.rows_skipped, 1);
        assert_eq!(first.batch_revenue, d("10.50"));

        let second = manager
            .ingest_bytes("feb.csv", FEBRUARY.as_bytes(), Some("2024-03-01"))
            .await
            .unwrap();
        assert_eq!(second.revision, 2);

        let accumulated = manager.accumulated().unwrap();
        assert_eq!(accumulated.revision, 2);
        assert_eq!(accumulated.rollup.artist("Luna").unwrap().revenue, d("15.75"));
        assert_eq!(accumulated.rollup.track("X1").unwrap().revenue, d("15.75"));
        assert_eq!(accumulated.rollup.platforms["Spotify"], d("15.75"));

        match events.recv().await.unwrap() {
            RollupEvent::AccumulatedRollupChanged {
                revision, batch_id, ..
            } => {
                assert_eq!(revision, 1);
                assert_eq!(batch_id, first.batch_id);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events.recv().await.unwrap().revision(), 2);
    }

    #[tokio::test]
    async fn test_malformed_file_leaves_state_untouched() {
        let manager = sqlite_manager();
        manager
            .ingest_bytes("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap();

        let err = manager
            .ingest_bytes("empty.csv", b"Artist;Track;Revenue\n", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestionError::Statement(StatementError::MalformedFile(_))
        ));
        assert!(!err.is_retryable());

        let accumulated = manager.accumulated().unwrap();
        assert_eq!(accumulated.revision, 1);
        assert_eq!(manager.store().batch_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_release_date_is_rejected() {
        let manager = sqlite_manager();
        let err = manager
            .ingest_bytes("jan.csv", JANUARY.as_bytes(), Some("01/03/2024"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::InvalidReleaseDate(_)));
        assert_eq!(manager.accumulated().unwrap().revision, 0);
    }

    #[tokio::test]
    async fn test_statement_with_only_skipped_rows_commits_empty_batch() {
        let manager = sqlite_manager();
        let report = manager
            .ingest_bytes("footer.csv", b"Artist;Track;Revenue\n;;\n", None)
            .await
            .unwrap();
        assert_eq!(report.rows_ingested, 0);
        assert_eq!(report.batch_revenue, Decimal::ZERO);
        assert_eq!(report.revision, 1);
    }

    #[tokio::test]
    async fn test_conflict_is_reported_as_retryable() {
        let mut store = MockRollupStore::new();
        store
            .expect_load_accumulated()
            .returning(|| Ok(AccumulatedRollup::default()));
        store
            .expect_commit_merge()
            .times(1)
            .returning(|_, _, _| Ok(CommitResult::Conflict { current_revision: 4 }));

        let manager = IngestionManager::new(
            Arc::new(store),
            RollupNotifier::default(),
            IngestionManagerConfig::default(),
        );
        let mut events = manager.notifier().subscribe();

        let err = manager
            .ingest_bytes("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap_err();
        match &err {
            IngestionError::ConcurrentMergeConflict { expected, actual } => {
                assert_eq!(*expected, 0);
                assert_eq!(*actual, 4);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.is_retryable());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retry_remerges_against_fresh_state() {
        let other_writer = GlobalRollup {
            total_revenue: d("1.00"),
            ..GlobalRollup::default()
        };

        let mut store = MockRollupStore::new();
        let mut loads = 0;
        store.expect_load_accumulated().times(2).returning(move || {
            loads += 1;
            if loads == 1 {
                Ok(AccumulatedRollup::default())
            } else {
                Ok(AccumulatedRollup {
                    revision: 1,
                    rollup: other_writer.clone(),
                    updated_at: Some(1),
                })
            }
        });
        store
            .expect_commit_merge()
            .times(2)
            .returning(|expected, _, merged| {
                if expected == 0 {
                    Ok(CommitResult::Conflict { current_revision: 1 })
                } else {
                    assert_eq!(merged.total_revenue, Decimal::from_str("11.50").unwrap());
                    Ok(CommitResult::Committed { revision: 2 })
                }
            });

        let manager = IngestionManager::new(
            Arc::new(store),
            RollupNotifier::default(),
            IngestionManagerConfig::default(),
        );

        let report = manager
            .ingest_bytes_retrying("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap();
        assert_eq!(report.revision, 2);
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mut store = MockRollupStore::new();
        store
            .expect_load_accumulated()
            .returning(|| Ok(AccumulatedRollup::default()));
        store
            .expect_commit_merge()
            .times(2)
            .returning(|_, _, _| Ok(CommitResult::Conflict { current_revision: 9 }));

        let manager = IngestionManager::new(
            Arc::new(store),
            RollupNotifier::default(),
            IngestionManagerConfig {
                max_conflict_retries: 1,
                ..IngestionManagerConfig::default()
            },
        );

        let err = manager
            .ingest_bytes_retrying("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_store_calls_run_on_the_blocking_pool() {
        let executor_thread = std::thread::current().id();
        let store_threads = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut store = MockRollupStore::new();
        let seen = Arc::clone(&store_threads);
        store.expect_load_accumulated().returning(move || {
            seen.lock().unwrap().push(std::thread::current().id());
            Ok(AccumulatedRollup::default())
        });
        let seen = Arc::clone(&store_threads);
        store.expect_commit_merge().returning(move |_, _, _| {
            seen.lock().unwrap().push(std::thread::current().id());
            Ok(CommitResult::Committed { revision: 1 })
        });
        store.expect_load_batch_log().returning(|| Ok(Vec::new()));
        store
            .expect_replace_accumulated()
            .returning(|_, _| Ok(CommitResult::Committed { revision: 2 }));

        let manager = IngestionManager::new(
            Arc::new(store),
            RollupNotifier::default(),
            IngestionManagerConfig::default(),
        );
        manager
            .ingest_bytes("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap();
        manager.rebuild_from_log().await.unwrap();

        let store_threads = store_threads.lock().unwrap();
        assert_eq!(store_threads.len(), 3);
        assert!(store_threads.iter().all(|id| *id != executor_thread));
    }

    #[tokio::test]
    async fn test_rebuild_from_log_matches_incremental_merges() {
        let manager = sqlite_manager();
        manager
            .ingest_bytes("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap();
        manager
            .ingest_bytes("feb.csv", FEBRUARY.as_bytes(), None)
            .await
            .unwrap();
        let before = manager.accumulated().unwrap();
        let mut events = manager.notifier().subscribe();

        let report = manager.rebuild_from_log().await.unwrap();
        assert_eq!(report.batch_count, 2);
        assert_eq!(report.revision, 3);
        assert_eq!(report.total_revenue, d("15.75"));

        let after = manager.accumulated().unwrap();
        assert_eq!(after.rollup, before.rollup);
        assert!(matches!(
            events.recv().await.unwrap(),
            RollupEvent::AccumulatedRollupRebuilt { batch_count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_rebuild_needs_batch_history() {
        let manager = IngestionManager::new(
            Arc::new(SqliteRollupStore::in_memory().unwrap().with_batch_history(false)),
            RollupNotifier::default(),
            IngestionManagerConfig::default(),
        );
        manager
            .ingest_bytes("jan.csv", JANUARY.as_bytes(), None)
            .await
            .unwrap();

        let err = manager.rebuild_from_log().await.unwrap_err();
        assert!(matches!(err, IngestionError::MissingBatchRollup(_)));
        assert_eq!(manager.accumulated().unwrap().revision, 1);
    }

    #[test]
    fn test_validate_release_date() {
        assert_eq!(validate_release_date(None).unwrap(), None);
        assert_eq!(validate_release_date(Some(" ")).unwrap(), None);
        assert_eq!(
            validate_release_date(Some("2024-02-29")).unwrap(),
            Some("2024-02-29".to_string())
        );
        assert!(validate_release_date(Some("2023-02-29")).is_err());
    }
}
