//! Consistency checks over a rollup's redundant sums.

use super::models::{ArtistAggregate, GlobalRollup};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    /// Where the mismatch was found, e.g. `artist "Luna" track X1`.
    pub scope: String,
    pub what: &'static str,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} expected {} but was {}",
            self.scope, self.what, self.expected, self.actual
        )
    }
}

struct Checker {
    violations: Vec<InvariantViolation>,
}

impl Checker {
    fn check<T: PartialEq + ToString>(&mut self, scope: &str, what: &'static str, expected: T, actual: T) {
        if expected != actual {
            self.violations.push(InvariantViolation {
                scope: scope.to_string(),
                what,
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }
}

fn map_sum(map: &BTreeMap<String, Decimal>) -> Decimal {
    map.values().copied().sum()
}

fn summed_maps<'a, F>(rollup: &'a GlobalRollup, pick: F) -> BTreeMap<String, Decimal>
where
    F: Fn(&'a ArtistAggregate) -> &'a BTreeMap<String, Decimal>,
{
    let mut out = BTreeMap::new();
    for artist in rollup.artists.values() {
        for (key, revenue) in pick(artist) {
            *out.entry(key.clone()).or_insert(Decimal::ZERO) += *revenue;
        }
    }
    out
}

/// Checks every sum the rollup stores redundantly: track against platform
/// details, artist against tracks and dimension maps, global against
/// artists. An empty result means the rollup is consistent.
pub fn check_invariants(rollup: &GlobalRollup) -> Vec<InvariantViolation> {
    let mut checker = Checker {
        violations: Vec::new(),
    };

    for artist in rollup.artists.values() {
        let scope = format!("artist {:?}", artist.name);

        for (key, track) in &artist.tracks {
            let track_scope = format!("{} track {}", scope, key);
            checker.check(
                &track_scope,
                "revenue vs platforms",
                track.revenue,
                track.platforms.values().map(|p| p.revenue).sum(),
            );
            checker.check(
                &track_scope,
                "streams vs platforms",
                track.streams,
                track.platforms.values().map(|p| p.streams).sum(),
            );
            for (platform, detail) in &track.platforms {
                let detail_scope = format!("{} platform {:?}", track_scope, platform);
                checker.check(
                    &detail_scope,
                    "revenue vs detail lines",
                    detail.revenue,
                    detail.details.iter().map(|e| e.revenue).sum(),
                );
                checker.check(
                    &detail_scope,
                    "streams vs detail lines",
                    detail.streams,
                    detail.details.iter().map(|e| e.quantity).sum(),
                );
            }
        }

        checker.check(
            &scope,
            "revenue vs tracks",
            artist.revenue,
            artist.tracks.values().map(|t| t.revenue).sum(),
        );
        checker.check(
            &scope,
            "streams vs tracks",
            artist.streams,
            artist.tracks.values().map(|t| t.streams).sum(),
        );
        checker.check(&scope, "revenue vs platforms", artist.revenue, map_sum(&artist.platforms));
        checker.check(&scope, "revenue vs territories", artist.revenue, map_sum(&artist.territories));
        checker.check(&scope, "revenue vs periods", artist.revenue, map_sum(&artist.periods));
    }

    checker.check(
        "global",
        "total revenue vs artists",
        rollup.total_revenue,
        rollup.artists.values().map(|a| a.revenue).sum(),
    );
    checker.check(
        "global",
        "total streams vs artists",
        rollup.total_streams,
        rollup.artists.values().map(|a| a.streams).sum(),
    );
    checker.check("global", "artist count", rollup.total_artists, rollup.artists.len());
    checker.check(
        "global",
        "track count",
        rollup.total_tracks,
        rollup.artists.values().map(|a| a.tracks.len()).sum(),
    );

    let dimensions: [(&'static str, &BTreeMap<String, Decimal>, BTreeMap<String, Decimal>); 3] = [
        ("platforms vs artists", &rollup.platforms, summed_maps(rollup, |a| &a.platforms)),
        ("territories vs artists", &rollup.territories, summed_maps(rollup, |a| &a.territories)),
        ("periods vs artists", &rollup.periods, summed_maps(rollup, |a| &a.periods)),
    ];
    for (what, global, from_artists) in dimensions {
        let keys: BTreeSet<&String> = global.keys().chain(from_artists.keys()).collect();
        for key in keys {
            checker.check(
                &format!("global {:?}", key),
                what,
                from_artists.get(key).copied().unwrap_or(Decimal::ZERO),
                global.get(key).copied().unwrap_or(Decimal::ZERO),
            );
        }
    }

    checker.violations
}
