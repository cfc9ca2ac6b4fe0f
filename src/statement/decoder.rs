//! Turns one raw statement line into a typed [`DecodedRow`].

use super::columns::{HeaderMap, StatementField};
use super::number::{normalize_amount, normalize_quantity};
use rust_decimal::Decimal;

/// One royalty line item, ready for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub artist_name: String,
    pub track_name: String,
    pub release_name: String,
    pub isrc: Option<String>,
    /// Empty when the statement does not name a platform.
    pub platform: String,
    pub territory: String,
    /// Opaque period token, e.g. "2024M03".
    pub period: String,
    pub quantity: u64,
    pub revenue: Decimal,
    pub currency: String,
    pub transaction_type: String,
    /// Passthrough metadata, has no effect on aggregation.
    pub release_date_override: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingArtist,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Row {
        row: DecodedRow,
        /// Numeric fields that held content but normalized to zero.
        unparseable_numbers: u32,
    },
    Skip(SkipReason),
}

fn text(header_map: &HeaderMap, field: StatementField, columns: &[&str]) -> String {
    header_map
        .get(field, columns)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Decodes a row using the file's header mapping. Rows without an artist name
/// (footers, totals, blank separator lines) are skipped.
pub fn decode_row(
    header_map: &HeaderMap,
    columns: &[&str],
    release_date_override: Option<&str>,
) -> DecodeOutcome {
    let artist_name = text(header_map, StatementField::Artist, columns);
    if artist_name.is_empty() {
        return DecodeOutcome::Skip(SkipReason::MissingArtist);
    }

    let mut unparseable_numbers = 0;

    let (quantity, bad_quantity) =
        normalize_quantity(header_map.get(StatementField::Quantity, columns).unwrap_or(""));
    if bad_quantity {
        unparseable_numbers += 1;
    }

    let revenue = normalize_amount(header_map.get(StatementField::Revenue, columns).unwrap_or(""));
    if revenue.is_unparseable() {
        unparseable_numbers += 1;
    }

    let isrc = text(header_map, StatementField::Isrc, columns).to_uppercase();

    DecodeOutcome::Row {
        row: DecodedRow {
            artist_name,
            track_name: text(header_map, StatementField::TrackTitle, columns),
            release_name: text(header_map, StatementField::Release, columns),
            isrc: if isrc.is_empty() { None } else { Some(isrc) },
            platform: text(header_map, StatementField::Platform, columns),
            territory: text(header_map, StatementField::Territory, columns),
            period: text(header_map, StatementField::Period, columns),
            quantity,
            revenue: revenue.value(),
            currency: text(header_map, StatementField::Currency, columns).to_uppercase(),
            transaction_type: text(header_map, StatementField::TransactionType, columns),
            release_date_override: release_date_override.map(str::to_string),
        },
        unparseable_numbers,
    }
}
