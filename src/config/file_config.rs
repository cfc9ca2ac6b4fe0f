use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// `royalty-ledger.toml` contents. Every field is optional; present values
/// override the command line.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub top_artists_count: Option<usize>,
    pub event_channel_capacity: Option<usize>,
    pub keep_batch_history: Option<bool>,
    pub max_conflict_retries: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
