//! Merge engine: folds one rollup into another.
//!
//! Every numeric field is summed key by key, detail lists are concatenated and
//! re-sorted, and the derived fields (counts, top artists) are recomputed from
//! the merged maps. The fold is commutative and associative, so the order in
//! which statements are ingested never changes the accumulated result.
//! It is not idempotent: merging the same batch twice counts it twice.

use super::models::{
    pick_isrc, pick_text, AccumulatedRollup, ArtistAggregate, GlobalRollup, PlatformDetail,
    StatementBatch, TrackAggregate,
};
use super::views::rank_artists;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn merge_sums(into: &mut BTreeMap<String, Decimal>, from: &BTreeMap<String, Decimal>) {
    for (key, revenue) in from {
        *into.entry(key.clone()).or_insert(Decimal::ZERO) += *revenue;
    }
}

fn merge_platform(into: &mut PlatformDetail, from: &PlatformDetail) {
    into.revenue += from.revenue;
    into.streams += from.streams;
    into.details.extend(from.details.iter().cloned());
    into.details.sort();
}

fn merge_track(into: &mut TrackAggregate, from: &TrackAggregate) {
    into.name = pick_text(&into.name, &from.name);
    into.release = pick_text(&into.release, &from.release);
    into.isrc = pick_isrc(&into.isrc, &from.isrc);
    into.revenue += from.revenue;
    into.streams += from.streams;
    for (platform, detail) in &from.platforms {
        match into.platforms.get_mut(platform) {
            Some(existing) => merge_platform(existing, detail),
            None => {
                into.platforms.insert(platform.clone(), detail.clone());
            }
        }
    }
}

fn merge_artist(into: &mut ArtistAggregate, from: &ArtistAggregate) {
    into.revenue += from.revenue;
    into.streams += from.streams;
    for (key, track) in &from.tracks {
        match into.tracks.get_mut(key) {
            Some(existing) => merge_track(existing, track),
            None => {
                into.tracks.insert(key.clone(), track.clone());
            }
        }
    }
    merge_sums(&mut into.platforms, &from.platforms);
    merge_sums(&mut into.territories, &from.territories);
    merge_sums(&mut into.periods, &from.periods);
}

/// Returns the rollup equal to aggregating the rows of `previous` and
/// `incoming` together.
pub fn merge(previous: &GlobalRollup, incoming: &GlobalRollup, top_artists_count: usize) -> GlobalRollup {
    let mut artists = previous.artists.clone();
    for (name, artist) in &incoming.artists {
        match artists.get_mut(name) {
            Some(existing) => merge_artist(existing, artist),
            None => {
                artists.insert(name.clone(), artist.clone());
            }
        }
    }

    let mut platforms = previous.platforms.clone();
    merge_sums(&mut platforms, &incoming.platforms);
    let mut territories = previous.territories.clone();
    merge_sums(&mut territories, &incoming.territories);
    let mut periods = previous.periods.clone();
    merge_sums(&mut periods, &incoming.periods);

    GlobalRollup {
        total_revenue: previous.total_revenue + incoming.total_revenue,
        total_streams: previous.total_streams + incoming.total_streams,
        total_artists: artists.len(),
        total_tracks: artists.values().map(|a| a.tracks.len()).sum(),
        platforms,
        territories,
        periods,
        top_artists: rank_artists(&artists, top_artists_count),
        artists,
    }
}

/// Merges a freshly ingested batch into the accumulated state. The revision
/// is left as-is; the store assigns the new one when it commits.
pub fn merge_batch(
    previous: &AccumulatedRollup,
    incoming: &StatementBatch,
    top_artists_count: usize,
) -> AccumulatedRollup {
    AccumulatedRollup {
        revision: previous.revision,
        rollup: merge(&previous.rollup, &incoming.rollup, top_artists_count),
        updated_at: previous.updated_at,
    }
}

/// Folds rollups in sequence, starting from an empty one.
pub fn fold<'a, I>(rollups: I, top_artists_count: usize) -> GlobalRollup
where
    I: IntoIterator<Item = &'a GlobalRollup>,
{
    rollups
        .into_iter()
        .fold(GlobalRollup::default(), |acc, next| {
            merge(&acc, next, top_artists_count)
        })
}
