//! End-to-end tests for the query views over the accumulated rollup

mod common;

use common::*;
use royalty_ledger::rollup::views::{
    artist_breakdown, percent_of_total, period_series, platform_breakdown, territory_breakdown,
    top_artists,
};
use royalty_ledger::rollup::{GlobalRollup, OTHER_PLATFORM, OTHER_TERRITORY};

async fn ingest_all(ledger: &TestLedger) -> GlobalRollup {
    for (name, contents) in [
        ("jan.csv", JANUARY_STATEMENT),
        ("feb.csv", FEBRUARY_STATEMENT),
        ("mar.tsv", MARCH_STATEMENT),
    ] {
        let path = ledger.write_statement(name, contents);
        ledger.manager.ingest_file(&path, None).await.unwrap();
    }
    ledger.manager.accumulated().unwrap().rollup
}

#[tokio::test]
async fn test_top_artists_by_revenue() {
    let ledger = TestLedger::new();
    let rollup = ingest_all(&ledger).await;

    let names: Vec<&str> = rollup.top_artists.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec![LUNA, AURORA_SUR, RIO_NORTE]);
    assert_eq!(rollup.top_artists[0].revenue, d("1038.55"));

    let top_two = top_artists(&rollup, 2);
    assert_eq!(top_two.len(), 2);
    assert_eq!(top_two[1].name, AURORA_SUR);
    assert_eq!(top_two[1].streams, 300);
}

#[tokio::test]
async fn test_platform_breakdown_sums_to_total() {
    let ledger = TestLedger::new();
    let rollup = ingest_all(&ledger).await;

    let platforms = platform_breakdown(&rollup);
    let names: Vec<&str> = platforms.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Apple Music", "Spotify", "Tidal", "Deezer", OTHER_PLATFORM]
    );
    assert_eq!(platforms[1].revenue, d("19.60"));

    let total: rust_decimal::Decimal = platforms.iter().map(|p| p.revenue).sum();
    assert_eq!(total, rollup.total_revenue);

    assert_eq!(percent_of_total(&rollup, "Apple Music"), platforms[0].percent);
    assert_eq!(percent_of_total(&rollup, "Napster"), d("0"));
}

#[tokio::test]
async fn test_territory_and_period_views() {
    let ledger = TestLedger::new();
    let rollup = ingest_all(&ledger).await;

    let territories = territory_breakdown(&rollup);
    assert_eq!(territories[0].name, "MX");
    assert!(territories
        .iter()
        .any(|t| t.name == OTHER_TERRITORY && t.revenue == d(MARCH_REVENUE)));

    let periods: Vec<String> = period_series(&rollup)
        .into_iter()
        .map(|p| p.period)
        .collect();
    assert_eq!(periods, vec!["2024-03", "2024M01", "2024M02"]);
}

#[tokio::test]
async fn test_artist_breakdown() {
    let ledger = TestLedger::new();
    let rollup = ingest_all(&ledger).await;

    let luna = artist_breakdown(&rollup, LUNA).unwrap();
    assert_eq!(luna.revenue, d("1038.55"));
    assert_eq!(luna.tracks.len(), 3);
    assert_eq!(luna.tracks[0].name, "Faro");
    assert_eq!(luna.tracks[1].isrc.as_deref(), Some(MAREA_ISRC));
    assert_eq!(luna.tracks[1].revenue, d("17.55"));
    assert_eq!(luna.tracks[2].isrc, None);

    let track_total: rust_decimal::Decimal = luna.tracks.iter().map(|t| t.revenue).sum();
    assert_eq!(track_total, luna.revenue);

    assert!(artist_breakdown(&rollup, "Nobody").is_none());
}

#[tokio::test]
async fn test_views_over_empty_ledger() {
    let ledger = TestLedger::new();
    let rollup = ledger.manager.accumulated().unwrap().rollup;

    assert!(rollup.is_empty());
    assert!(top_artists(&rollup, 10).is_empty());
    assert!(platform_breakdown(&rollup).is_empty());
    assert!(period_series(&rollup).is_empty());
    assert_eq!(percent_of_total(&rollup, "Spotify"), d("0"));
}
