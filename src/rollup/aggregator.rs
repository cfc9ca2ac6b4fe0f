//! Folds the decoded rows of one statement into a self-contained rollup.

use super::models::{
    pick_isrc, pick_text, track_key, ArtistAggregate, DetailEntry, GlobalRollup, StatementBatch,
    TrackAggregate, NO_DATE, OTHER_PLATFORM, OTHER_TERRITORY,
};
use super::views::rank_artists;
use crate::statement::{DecodeStats, DecodedRow};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

fn bucket<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn add_revenue(map: &mut BTreeMap<String, Decimal>, key: &str, revenue: Decimal) {
    *map.entry(key.to_string()).or_insert(Decimal::ZERO) += revenue;
}

/// Single-pass aggregator. Rows can be pushed as they are decoded, the
/// aggregator never needs the whole statement in memory.
pub struct BatchAggregator {
    artists: BTreeMap<String, ArtistAggregate>,
    platforms: BTreeMap<String, Decimal>,
    territories: BTreeMap<String, Decimal>,
    periods: BTreeMap<String, Decimal>,
    currencies: BTreeSet<String>,
    rows: u64,
    top_artists_count: usize,
}

impl BatchAggregator {
    pub fn new(top_artists_count: usize) -> Self {
        Self {
            artists: BTreeMap::new(),
            platforms: BTreeMap::new(),
            territories: BTreeMap::new(),
            periods: BTreeMap::new(),
            currencies: BTreeSet::new(),
            rows: 0,
            top_artists_count,
        }
    }

    pub fn push(&mut self, row: DecodedRow) {
        let platform = bucket(&row.platform, OTHER_PLATFORM);
        let territory = bucket(&row.territory, OTHER_TERRITORY);
        let period = bucket(&row.period, NO_DATE);

        let artist = self
            .artists
            .entry(row.artist_name.clone())
            .or_insert_with(|| ArtistAggregate::new(row.artist_name.clone()));

        let key = track_key(&row.artist_name, &row.track_name, row.isrc.as_deref());
        let track = artist.tracks.entry(key).or_insert_with(|| {
            TrackAggregate::new(
                row.track_name.clone(),
                row.release_name.clone(),
                row.isrc.clone(),
            )
        });
        track.name = pick_text(&track.name, &row.track_name);
        track.release = pick_text(&track.release, &row.release_name);
        track.isrc = pick_isrc(&track.isrc, &row.isrc);

        let detail = track.platforms.entry(platform.to_string()).or_default();
        detail.revenue += row.revenue;
        detail.streams += row.quantity;
        detail.details.push(DetailEntry {
            period: period.to_string(),
            territory: territory.to_string(),
            quantity: row.quantity,
            revenue: row.revenue,
        });

        track.revenue += row.revenue;
        track.streams += row.quantity;

        artist.revenue += row.revenue;
        artist.streams += row.quantity;
        add_revenue(&mut artist.platforms, platform, row.revenue);
        add_revenue(&mut artist.territories, territory, row.revenue);
        add_revenue(&mut artist.periods, period, row.revenue);

        add_revenue(&mut self.platforms, platform, row.revenue);
        add_revenue(&mut self.territories, territory, row.revenue);
        add_revenue(&mut self.periods, period, row.revenue);

        if !row.currency.is_empty() {
            self.currencies.insert(row.currency);
        }
        self.rows += 1;
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Builds the rollup. Global totals and counts are derived here from the
    /// per-artist data rather than tracked while pushing.
    pub fn finish_rollup(self) -> GlobalRollup {
        self.into_parts().0
    }

    fn into_parts(mut self) -> (GlobalRollup, BTreeSet<String>, u64) {
        for artist in self.artists.values_mut() {
            for track in artist.tracks.values_mut() {
                for detail in track.platforms.values_mut() {
                    detail.details.sort();
                }
            }
        }

        let total_revenue = self.artists.values().map(|a| a.revenue).sum();
        let total_streams = self.artists.values().map(|a| a.streams).sum();
        let total_tracks = self.artists.values().map(|a| a.tracks.len()).sum();
        let top_artists = rank_artists(&self.artists, self.top_artists_count);

        let rollup = GlobalRollup {
            total_revenue,
            total_streams,
            total_artists: self.artists.len(),
            total_tracks,
            platforms: self.platforms,
            territories: self.territories,
            periods: self.periods,
            top_artists,
            artists: self.artists,
        };
        (rollup, self.currencies, self.rows)
    }

    /// Seals the aggregated rows into an immutable batch record.
    pub fn finish(
        self,
        batch_id: impl Into<String>,
        source_filename: impl Into<String>,
        stats: DecodeStats,
        release_date_override: Option<String>,
        ingested_at: i64,
    ) -> StatementBatch {
        let (rollup, currencies, rows) = self.into_parts();
        StatementBatch {
            batch_id: batch_id.into(),
            source_filename: source_filename.into(),
            row_count: rows,
            stats,
            release_date_override,
            currencies,
            ingested_at,
            rollup,
        }
    }
}

/// Aggregates a sequence of rows in one go.
pub fn aggregate<I>(rows: I, top_artists_count: usize) -> GlobalRollup
where
    I: IntoIterator<Item = DecodedRow>,
{
    let mut aggregator = BatchAggregator::new(top_artists_count);
    for row in rows {
        aggregator.push(row);
    }
    aggregator.finish_rollup()
}
