//! Rollup data model: artist → track → platform detail, plus flat
//! platform/territory/period totals.
//!
//! Maps are `BTreeMap`s so two rollups holding the same sums compare equal
//! and serialize identically, whatever order their rows arrived in.

use crate::statement::DecodeStats;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bucket for rows that name no platform.
pub const OTHER_PLATFORM: &str = "Other platform";
/// Bucket for rows that name no territory.
pub const OTHER_TERRITORY: &str = "Other territory";
/// Bucket for rows that name no period.
pub const NO_DATE: &str = "No date";

/// Size of the derived top-artists list unless configured otherwise.
pub const DEFAULT_TOP_ARTISTS: usize = 10;

/// Identity of a track within an artist: the ISRC when there is one,
/// otherwise artist and title together.
pub fn track_key(artist_name: &str, track_name: &str, isrc: Option<&str>) -> String {
    match isrc.map(str::trim).filter(|i| !i.is_empty()) {
        Some(isrc) => isrc.to_uppercase(),
        None => format!("{}::{}", artist_name, track_name),
    }
}

/// Resolves two sightings of a descriptive track field (name, release): the
/// smallest non-empty value wins, whatever order the sightings come in.
/// Rows within a batch and batches within a merge both go through here.
pub fn pick_text(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => left.min(right).to_string(),
    }
}

/// ISRC counterpart of [`pick_text`].
pub fn pick_isrc(left: &Option<String>, right: &Option<String>) -> Option<String> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.min(r).clone()),
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

/// One statement line as seen from a track's platform detail.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DetailEntry {
    pub period: String,
    pub territory: String,
    pub quantity: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformDetail {
    pub revenue: Decimal,
    pub streams: u64,
    /// Kept in canonical (sorted) order.
    pub details: Vec<DetailEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAggregate {
    pub name: String,
    pub release: String,
    pub isrc: Option<String>,
    pub revenue: Decimal,
    pub streams: u64,
    pub platforms: BTreeMap<String, PlatformDetail>,
}

impl TrackAggregate {
    pub fn new(name: impl Into<String>, release: impl Into<String>, isrc: Option<String>) -> Self {
        Self {
            name: name.into(),
            release: release.into(),
            isrc,
            revenue: Decimal::ZERO,
            streams: 0,
            platforms: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistAggregate {
    pub name: String,
    pub revenue: Decimal,
    pub streams: u64,
    /// Keyed by [`track_key`].
    pub tracks: BTreeMap<String, TrackAggregate>,
    pub platforms: BTreeMap<String, Decimal>,
    pub territories: BTreeMap<String, Decimal>,
    pub periods: BTreeMap<String, Decimal>,
}

impl ArtistAggregate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revenue: Decimal::ZERO,
            streams: 0,
            tracks: BTreeMap::new(),
            platforms: BTreeMap::new(),
            territories: BTreeMap::new(),
            periods: BTreeMap::new(),
        }
    }
}

/// Entry of the derived top-artists list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRanking {
    pub name: String,
    pub revenue: Decimal,
    pub streams: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalRollup {
    pub total_revenue: Decimal,
    pub total_streams: u64,
    pub total_artists: usize,
    pub total_tracks: usize,
    pub platforms: BTreeMap<String, Decimal>,
    pub territories: BTreeMap<String, Decimal>,
    pub periods: BTreeMap<String, Decimal>,
    /// Derived view, recomputed whenever the rollup changes.
    pub top_artists: Vec<ArtistRanking>,
    pub artists: BTreeMap<String, ArtistAggregate>,
}

impl GlobalRollup {
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
            && self.platforms.is_empty()
            && self.total_revenue.is_zero()
            && self.total_streams == 0
    }

    pub fn artist(&self, name: &str) -> Option<&ArtistAggregate> {
        self.artists.get(name)
    }

    /// Looks up a track by key across all artists.
    pub fn track(&self, key: &str) -> Option<&TrackAggregate> {
        self.artists.values().find_map(|a| a.tracks.get(key))
    }
}

/// The self-contained result of ingesting one statement file. Never mutated
/// once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementBatch {
    pub batch_id: String,
    pub source_filename: String,
    /// Decoded (non-skipped) rows folded into the rollup.
    pub row_count: u64,
    pub stats: DecodeStats,
    pub release_date_override: Option<String>,
    /// Currencies seen in the file. Amounts are summed as-is, without conversion.
    pub currencies: BTreeSet<String>,
    /// Unix milliseconds.
    pub ingested_at: i64,
    pub rollup: GlobalRollup,
}

/// Batch log entry without the rollup payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub source_filename: String,
    pub row_count: u64,
    pub rows_skipped: u64,
    pub unparseable_numbers: u64,
    pub release_date_override: Option<String>,
    pub currencies: BTreeSet<String>,
    pub ingested_at: i64,
    pub total_revenue: Decimal,
    pub total_streams: u64,
    /// False when the batch was logged without its rollup.
    pub has_rollup: bool,
}

impl From<&StatementBatch> for BatchSummary {
    fn from(batch: &StatementBatch) -> Self {
        Self {
            batch_id: batch.batch_id.clone(),
            source_filename: batch.source_filename.clone(),
            row_count: batch.row_count,
            rows_skipped: batch.stats.rows_skipped,
            unparseable_numbers: batch.stats.unparseable_numbers,
            release_date_override: batch.release_date_override.clone(),
            currencies: batch.currencies.clone(),
            ingested_at: batch.ingested_at,
            total_revenue: batch.rollup.total_revenue,
            total_streams: batch.rollup.total_streams,
            has_rollup: true,
        }
    }
}

/// The persisted running total and the revision it was stored at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulatedRollup {
    /// 0 until the first merge is committed.
    pub revision: i64,
    pub rollup: GlobalRollup,
    /// Unix milliseconds of the last write, if any.
    pub updated_at: Option<i64>,
}
