//! Delimited statement file reading.
//!
//! The delimiter is sniffed from the header line (tab, then semicolon, else
//! comma). Quoted fields may contain the delimiter; `csv` tracks quote state
//! per character and unescapes doubled quotes.

use super::columns::HeaderMap;
use super::decoder::{decode_row, DecodeOutcome, DecodedRow};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that abort the ingestion of a whole statement file.
#[derive(Debug, Error)]
pub enum StatementError {
    #[error("Malformed statement file: {0}")]
    MalformedFile(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Row accounting for one statement file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Data lines read after the header.
    pub rows_read: u64,
    /// Lines dropped because they carry no artist name.
    pub rows_skipped: u64,
    /// Numeric fields that had content but normalized to zero.
    pub unparseable_numbers: u64,
}

impl DecodeStats {
    pub fn rows_decoded(&self) -> u64 {
        self.rows_read - self.rows_skipped
    }
}

/// Picks the field delimiter from the header line.
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') {
        b'\t'
    } else if header_line.contains(';') {
        b';'
    } else {
        b','
    }
}

fn first_line(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == b'\n').unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Reads a statement, decoding each data line and handing it to `on_row`
/// as soon as it is decoded, so callers can aggregate without buffering the
/// whole file.
pub fn read_statement<F>(
    data: &[u8],
    release_date_override: Option<&str>,
    mut on_row: F,
) -> Result<DecodeStats, StatementError>
where
    F: FnMut(DecodedRow),
{
    let header_line = first_line(data);
    if header_line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}').is_empty() {
        return Err(StatementError::MalformedFile(
            "missing header line".to_string(),
        ));
    }
    let delimiter = detect_delimiter(&header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut records = reader.byte_records();
    let header_map = match records.next() {
        Some(header) => {
            let header = header?;
            let cells: Vec<String> = header
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .collect();
            HeaderMap::from_headers(cells.iter().map(String::as_str))
        }
        None => {
            return Err(StatementError::MalformedFile(
                "missing header line".to_string(),
            ))
        }
    };

    let missing = header_map.missing_fields();
    if !missing.is_empty() {
        warn!(
            "Statement header has no column for: {}",
            missing
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let mut stats = DecodeStats::default();
    for record in records {
        let record = record?;
        stats.rows_read += 1;
        let line = stats.rows_read + 1;

        let cells: Vec<String> = record
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).into_owned())
            .collect();
        let columns: Vec<&str> = cells.iter().map(String::as_str).collect();

        match decode_row(&header_map, &columns, release_date_override) {
            DecodeOutcome::Row {
                row,
                unparseable_numbers,
            } => {
                if unparseable_numbers > 0 {
                    debug!(
                        "Line {}: {} numeric field(s) unparseable, counted as zero",
                        line, unparseable_numbers
                    );
                    stats.unparseable_numbers += unparseable_numbers as u64;
                }
                on_row(row);
            }
            DecodeOutcome::Skip(reason) => {
                debug!("Line {}: skipped ({:?})", line, reason);
                stats.rows_skipped += 1;
            }
        }
    }

    if stats.rows_read == 0 {
        return Err(StatementError::MalformedFile(
            "no data rows after header".to_string(),
        ));
    }

    Ok(stats)
}
