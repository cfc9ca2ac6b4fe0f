mod file_config;

pub use file_config::FileConfig;

use crate::ingestion::IngestionManagerConfig;
use crate::notifications::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::rollup::DEFAULT_TOP_ARTISTS;
use anyhow::{bail, Result};
use std::path::PathBuf;

pub const ROLLUP_DB_FILENAME: &str = "royalties.db";

/// Settings taken from command-line flags, before the config file is applied.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub top_artists_count: usize,
    pub event_channel_capacity: usize,
    pub keep_batch_history: bool,
    pub max_conflict_retries: u32,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            top_artists_count: DEFAULT_TOP_ARTISTS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            keep_batch_history: true,
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub top_artists_count: usize,
    pub event_channel_capacity: usize,
    pub keep_batch_history: bool,
    pub max_conflict_retries: u32,
}

impl AppConfig {
    /// Merges flags with the optional config file. A value set in the file
    /// wins over the flag.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in the config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let top_artists_count = file.top_artists_count.unwrap_or(cli.top_artists_count);
        if top_artists_count == 0 {
            bail!("top_artists_count must be at least 1");
        }

        Ok(Self {
            db_dir,
            top_artists_count,
            event_channel_capacity: file
                .event_channel_capacity
                .unwrap_or(cli.event_channel_capacity)
                .max(1),
            keep_batch_history: file.keep_batch_history.unwrap_or(cli.keep_batch_history),
            max_conflict_retries: file
                .max_conflict_retries
                .unwrap_or(cli.max_conflict_retries),
        })
    }

    pub fn rollup_db_path(&self) -> PathBuf {
        self.db_dir.join(ROLLUP_DB_FILENAME)
    }

    pub fn ingestion_config(&self) -> IngestionManagerConfig {
        IngestionManagerConfig {
            top_artists_count: self.top_artists_count,
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}
