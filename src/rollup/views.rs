//! Read-only projections computed on demand from a rollup. Nothing here is
//! stored; callers recompute on every read.

use super::models::{ArtistAggregate, ArtistRanking, GlobalRollup};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Ranks artists by revenue, highest first, ties broken by name.
pub fn rank_artists(artists: &BTreeMap<String, ArtistAggregate>, limit: usize) -> Vec<ArtistRanking> {
    let mut ranked: Vec<&ArtistAggregate> = artists.values().collect();
    ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    ranked
        .into_iter()
        .take(limit)
        .map(|a| ArtistRanking {
            name: a.name.clone(),
            revenue: a.revenue,
            streams: a.streams,
        })
        .collect()
}

pub fn top_artists(rollup: &GlobalRollup, n: usize) -> Vec<ArtistRanking> {
    rank_artists(&rollup.artists, n)
}

/// `part` as a percentage of `total`, rounded to two decimals. Zero when the
/// total is zero.
pub fn percent(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (part * Decimal::ONE_HUNDRED / total).round_dp(2)
}

/// Share of total revenue earned on one platform. Unknown platforms are 0%.
pub fn percent_of_total(rollup: &GlobalRollup, platform: &str) -> Decimal {
    let revenue = rollup
        .platforms
        .get(platform)
        .copied()
        .unwrap_or(Decimal::ZERO);
    percent(revenue, rollup.total_revenue)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodPoint {
    pub period: String,
    pub revenue: Decimal,
}

/// Revenue per period, ordered by period key ascending.
pub fn period_series(rollup: &GlobalRollup) -> Vec<PeriodPoint> {
    rollup
        .periods
        .iter()
        .map(|(period, revenue)| PeriodPoint {
            period: period.clone(),
            revenue: *revenue,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEntry {
    pub name: String,
    pub revenue: Decimal,
    pub percent: Decimal,
}

fn breakdown(map: &BTreeMap<String, Decimal>, total: Decimal) -> Vec<BreakdownEntry> {
    let mut entries: Vec<BreakdownEntry> = map
        .iter()
        .map(|(name, revenue)| BreakdownEntry {
            name: name.clone(),
            revenue: *revenue,
            percent: percent(*revenue, total),
        })
        .collect();
    entries.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    entries
}

pub fn platform_breakdown(rollup: &GlobalRollup) -> Vec<BreakdownEntry> {
    breakdown(&rollup.platforms, rollup.total_revenue)
}

pub fn territory_breakdown(rollup: &GlobalRollup) -> Vec<BreakdownEntry> {
    breakdown(&rollup.territories, rollup.total_revenue)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackLine {
    pub key: String,
    pub name: String,
    pub isrc: Option<String>,
    pub revenue: Decimal,
    pub streams: u64,
    pub percent: Decimal,
}

/// One artist seen in isolation: tracks and dimensions as shares of the
/// artist's own revenue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistBreakdown {
    pub name: String,
    pub revenue: Decimal,
    pub streams: u64,
    /// Share of the global total.
    pub percent_of_total: Decimal,
    pub tracks: Vec<TrackLine>,
    pub platforms: Vec<BreakdownEntry>,
    pub territories: Vec<BreakdownEntry>,
    pub periods: Vec<PeriodPoint>,
}

pub fn artist_breakdown(rollup: &GlobalRollup, name: &str) -> Option<ArtistBreakdown> {
    let artist = rollup.artist(name)?;

    let mut tracks: Vec<TrackLine> = artist
        .tracks
        .iter()
        .map(|(key, track)| TrackLine {
            key: key.clone(),
            name: track.name.clone(),
            isrc: track.isrc.clone(),
            revenue: track.revenue,
            streams: track.streams,
            percent: percent(track.revenue, artist.revenue),
        })
        .collect();
    tracks.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.key.cmp(&b.key)));

    Some(ArtistBreakdown {
        name: artist.name.clone(),
        revenue: artist.revenue,
        streams: artist.streams,
        percent_of_total: percent(artist.revenue, rollup.total_revenue),
        tracks,
        platforms: breakdown(&artist.platforms, artist.revenue),
        territories: breakdown(&artist.territories, artist.revenue),
        periods: artist
            .periods
            .iter()
            .map(|(period, revenue)| PeriodPoint {
                period: period.clone(),
                revenue: *revenue,
            })
            .collect(),
    })
}
