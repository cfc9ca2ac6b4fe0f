//! Locale-aware parsing of quantity and revenue fields.
//!
//! Distributor exports mix `1.234,56` and `1,234.56` styles (sometimes within
//! the same file), wrap values in quotes and prefix them with currency
//! symbols or ISO codes. Every numeric column goes through [`parse_amount`],
//! there is no other number parser in the crate.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Largest revenue magnitude accepted from a single field (10^15). Larger
/// values are reported as unparseable, which keeps sums over any realistic
/// number of rows and batches inside `Decimal` range.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

/// Largest play count accepted from a single field.
pub const MAX_QUANTITY: u64 = 10_000_000_000;

/// Result of normalizing a raw numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedAmount {
    /// The field held a number.
    Value(Decimal),
    /// The field was empty (or only whitespace/quotes).
    Empty,
    /// The field had content that is not a number. Normalizes to zero.
    Unparseable,
}

impl ParsedAmount {
    /// The numeric value, zero for empty or unparseable input.
    pub fn value(&self) -> Decimal {
        match self {
            ParsedAmount::Value(v) => *v,
            ParsedAmount::Empty | ParsedAmount::Unparseable => Decimal::ZERO,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, ParsedAmount::Unparseable)
    }
}

/// Normalizes a raw field into an exact decimal. Never fails: empty or
/// malformed input yields zero.
pub fn parse_amount(raw: &str) -> Decimal {
    normalize_amount(raw).value()
}

/// Same as [`parse_amount`] but tells empty fields apart from garbage so the
/// caller can count silent zeros.
pub fn normalize_amount(raw: &str) -> ParsedAmount {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
    if trimmed.is_empty() {
        return ParsedAmount::Empty;
    }

    // Accounting notation: (12,50) is a negative amount.
    let (negative_by_parens, body) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    // Currency symbols and ISO codes may lead or trail the number ("€ 12,50",
    // "12.50 USD", "-$3.10"). Inner whitespace is a grouping separator in
    // some locales ("1 234,56").
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let (negative_by_sign, digits) = strip_sign_and_currency(&compact);

    if digits.is_empty()
        || !digits
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        || !digits.chars().any(|c| c.is_ascii_digit())
    {
        return ParsedAmount::Unparseable;
    }

    let canonical = canonicalize_separators(digits);
    match Decimal::from_str(&canonical) {
        Ok(value) if value > Decimal::from(MAX_AMOUNT) => ParsedAmount::Unparseable,
        Ok(value) => {
            if negative_by_parens || negative_by_sign {
                ParsedAmount::Value(-value)
            } else {
                ParsedAmount::Value(value)
            }
        }
        Err(_) => ParsedAmount::Unparseable,
    }
}

/// Parses a play/unit count. Fractions are truncated; negative counts are
/// not valid quantities and are reported as unparseable.
pub fn normalize_quantity(raw: &str) -> (u64, bool) {
    match normalize_amount(raw) {
        ParsedAmount::Value(v) => match v.trunc().to_u64() {
            Some(q) if q <= MAX_QUANTITY => (q, false),
            _ => (0, true),
        },
        ParsedAmount::Empty => (0, false),
        ParsedAmount::Unparseable => (0, true),
    }
}

fn is_currency_char(c: char) -> bool {
    c.is_alphabetic()
        || matches!(
            c,
            '$' | '€' | '£' | '¥' | '₩' | '₹' | '₽' | '₺' | '₫' | '₱' | '₪' | '¢'
        )
}

fn strip_sign_and_currency(s: &str) -> (bool, &str) {
    let mut negative = false;
    let mut rest = s.trim_start_matches(is_currency_char);
    if let Some(r) = rest.strip_prefix('-') {
        negative = true;
        rest = r;
    } else if let Some(r) = rest.strip_prefix('+') {
        rest = r;
    }
    rest = rest.trim_start_matches(is_currency_char);
    rest = rest.trim_end_matches(is_currency_char);
    // Trailing minus shows up in some ERP exports ("12,50-").
    if !negative {
        if let Some(r) = rest.strip_suffix('-') {
            negative = true;
            rest = r;
        }
    }
    (negative, rest)
}

/// Rewrites a digits-and-separators string into `Decimal` syntax.
///
/// - both `.` and `,`: the one occurring last is the decimal point, the other
///   is grouping.
/// - only `,`: a single comma with at most two digits after it is the decimal
///   point, anything else is grouping.
/// - only `.`: a single dot is already a decimal point. Repeated dots
///   (`1.234.567`) are not a valid decimal as written; they are read as
///   grouping and the value is kept rather than counted as unparseable.
fn canonicalize_separators(digits: &str) -> String {
    let last_dot = digits.rfind('.');
    let last_comma = digits.rfind(',');

    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            let (decimal_sep, grouping_sep) = if dot > comma { ('.', ',') } else { (',', '.') };
            digits
                .chars()
                .filter(|&c| c != grouping_sep)
                .map(|c| if c == decimal_sep { '.' } else { c })
                .collect()
        }
        (None, Some(comma)) => {
            let comma_count = digits.matches(',').count();
            let fraction_len = digits.len() - comma - 1;
            if comma_count == 1 && fraction_len <= 2 {
                digits.replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
        (Some(_), None) => {
            if digits.matches('.').count() > 1 {
                digits.replace('.', "")
            } else {
                digits.to_string()
            }
        }
        (None, None) => digits.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_both_separators_last_one_is_decimal() {
        assert_eq!(parse_amount("1.234,56"), d("1234.56"));
        assert_eq!(parse_amount("1,234.56"), d("1234.56"));
        assert_eq!(parse_amount("1.234,56"), parse_amount("1,234.56"));
        assert_eq!(parse_amount("12.345.678,9"), d("12345678.9"));
    }

    #[test]
    fn test_plain_forms() {
        assert_eq!(parse_amount("1234.56"), d("1234.56"));
        assert_eq!(parse_amount("1234,56"), d("1234.56"));
        assert_eq!(parse_amount("0,5"), d("0.5"));
        assert_eq!(parse_amount("42"), d("42"));
    }

    #[test]
    fn test_lone_comma_with_three_digits_is_grouping() {
        assert_eq!(parse_amount("1,234"), d("1234"));
        assert_eq!(parse_amount("1,234,567"), d("1234567"));
        assert_eq!(parse_amount("0,000123"), d("123"));
    }

    #[test]
    fn test_repeated_dots_are_grouping() {
        assert_eq!(parse_amount("1.234.567"), d("1234567"));
        assert_eq!(normalize_amount("1.234.567"), ParsedAmount::Value(d("1234567")));
        assert_eq!(parse_amount("12.50"), d("12.50"));
    }

    #[test]
    fn test_empty_and_garbage_are_zero() {
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("   "), Decimal::ZERO);
        assert_eq!(parse_amount("abc"), Decimal::ZERO);
        assert_eq!(parse_amount("12abc34"), Decimal::ZERO);
        assert_eq!(parse_amount("--"), Decimal::ZERO);

        assert_eq!(normalize_amount(""), ParsedAmount::Empty);
        assert_eq!(normalize_amount("\"\""), ParsedAmount::Empty);
        assert!(normalize_amount("abc").is_unparseable());
        assert!(normalize_amount("1.2.3,4,5").is_unparseable());
    }

    #[test]
    fn test_currency_quotes_and_whitespace() {
        assert_eq!(parse_amount("\"€ 12,50\""), d("12.50"));
        assert_eq!(parse_amount("$1,234.50"), d("1234.50"));
        assert_eq!(parse_amount("12.50 USD"), d("12.50"));
        assert_eq!(parse_amount("EUR 12,50"), d("12.50"));
        assert_eq!(parse_amount("  7,25  "), d("7.25"));
        assert_eq!(parse_amount("1 234,56"), d("1234.56"));
    }

    #[test]
    fn test_negative_amounts() {
        assert_eq!(parse_amount("-3,10"), d("-3.10"));
        assert_eq!(parse_amount("-$3.10"), d("-3.10"));
        assert_eq!(parse_amount("(12,50)"), d("-12.50"));
        assert_eq!(parse_amount("12,50-"), d("-12.50"));
    }

    #[test]
    fn test_precision_is_kept() {
        // Per-stream royalties routinely have many fractional digits.
        assert_eq!(parse_amount("0.000345678"), d("0.000345678"));
        assert_eq!(
            parse_amount("0.1") + parse_amount("0.2"),
            d("0.3"),
            "decimal sums must be exact"
        );
    }

    #[test]
    fn test_amounts_beyond_range_are_unparseable() {
        let limit = Decimal::from(MAX_AMOUNT);
        assert_eq!(normalize_amount("1000000000000000"), ParsedAmount::Value(limit));
        assert_eq!(normalize_amount("-1.000.000.000.000.000,00"), ParsedAmount::Value(-limit));
        assert!(normalize_amount("1000000000000000,01").is_unparseable());
        assert!(normalize_amount("79228162514264337593543950335").is_unparseable());
        assert!(normalize_amount("-79228162514264337593543950335").is_unparseable());
        assert!(normalize_amount("792281625142643375935439503350").is_unparseable());
        assert_eq!(parse_amount("79228162514264337593543950335"), Decimal::ZERO);

        assert_eq!(normalize_quantity("10000000000"), (MAX_QUANTITY, false));
        assert_eq!(normalize_quantity("10000000001"), (0, true));
        assert_eq!(normalize_quantity("79228162514264337593543950335"), (0, true));
    }

    #[test]
    fn test_quantity() {
        assert_eq!(normalize_quantity("1500"), (1500, false));
        assert_eq!(normalize_quantity("1.500,00"), (1500, false));
        assert_eq!(normalize_quantity("3,7"), (3, false));
        assert_eq!(normalize_quantity(""), (0, false));
        assert_eq!(normalize_quantity("n/a"), (0, true));
        assert_eq!(normalize_quantity("-4"), (0, true));
    }
}
