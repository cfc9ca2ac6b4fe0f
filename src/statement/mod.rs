//! Royalty statement parsing.
//!
//! Pipeline for one distributor export:
//! 1. Sniff the delimiter from the header line
//! 2. Map header cells to logical fields through the synonym table
//! 3. Decode each data line, normalizing locale-ambiguous numbers
//! 4. Hand decoded rows to the caller one by one

mod columns;
mod decoder;
mod number;
mod reader;

pub use columns::{normalize_header, HeaderMap, StatementField};
pub use decoder::{decode_row, DecodeOutcome, DecodedRow, SkipReason};
pub use number::{
    normalize_amount, normalize_quantity, parse_amount, ParsedAmount, MAX_AMOUNT, MAX_QUANTITY,
};
pub use reader::{detect_delimiter, read_statement, DecodeStats, StatementError};
