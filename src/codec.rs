//! Conversions between displayed cell strings and numbers.
//!
//! Quantities are written as plain integers (`1234`), amounts with `,`
//! thousands separators (`1,234`). Parsing accepts either form.

use crate::layout::{self, Field};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMBER_REGEX: Regex =
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap();
}

/// Thousands separator used in amount cells.
pub const THOUSANDS_SEPARATOR: char = ',';

/// Largest value a user may enter into a quantity or amount cell.
///
/// 2^53 - 1, the largest integer every JSON and spreadsheet client
/// represents exactly. Aggregates of such values still fit in `i64`.
pub const MAX_CELL_VALUE: i64 = 9_007_199_254_740_991;

/// Removes every thousands separator from `raw`.
pub fn strip_separators(raw: &str) -> String {
    raw.chars().filter(|&c| c != THOUSANDS_SEPARATOR).collect()
}

/// Parses a cell value, returning `None` when it is not a finite number.
///
/// Empty input, free text, `NaN` and `inf` are all rejected. The result
/// is approximate for large values; use [`parse_integer`] for cell math.
pub fn try_parse_number(raw: &str) -> Option<f64> {
    let stripped = strip_separators(raw);
    let trimmed = stripped.trim();
    if !NUMBER_REGEX.is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a cell value exactly, rounding fractions half away from zero.
///
/// Decimal digits are handled as text, never through `f64`. Returns
/// `None` for non-numeric input and for values outside the `i64` range.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let stripped = strip_separators(raw);
    let trimmed = stripped.trim();
    if !NUMBER_REGEX.is_match(trimmed) {
        return None;
    }

    let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
        Some(at) => (&trimmed[..at], trimmed[at + 1..].parse::<i64>().ok()?),
        None => (trimmed, 0),
    };
    let (negative, unsigned) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = format!("{whole}{fraction}");
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some(0);
    }

    let scale = exponent.checked_sub(i64::try_from(fraction.len()).ok()?)?;
    let magnitude: u128 = if scale >= 0 {
        let shift = u32::try_from(scale).ok()?;
        if digits.len() as u64 + u64::from(shift) > 19 {
            return None;
        }
        digits.parse::<u128>().ok()? * 10u128.pow(shift)
    } else {
        let dropped = usize::try_from(scale.unsigned_abs()).ok()?;
        if dropped > digits.len() {
            0
        } else {
            let (kept, rest) = digits.split_at(digits.len() - dropped);
            if kept.len() > 19 {
                return None;
            }
            let kept = if kept.is_empty() { 0 } else { kept.parse::<u128>().ok()? };
            let round_up = rest.as_bytes().first().is_some_and(|&d| d >= b'5');
            kept + u128::from(round_up)
        }
    };

    let value = i64::try_from(magnitude).ok()?;
    Some(if negative { -value } else { value })
}

/// Parses a cell value to an integer, falling back to `default`.
///
/// Fractional input is rounded to the nearest integer.
pub fn parse_number(raw: &str, default: i64) -> i64 {
    parse_integer(raw).unwrap_or(default)
}

/// Formats a quantity: plain integer, no grouping.
pub fn format_quantity(n: i64) -> String {
    n.to_string()
}

/// Formats an amount with a separator every three digits.
pub fn format_amount(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(THOUSANDS_SEPARATOR);
        }
        grouped.push(ch);
    }
    grouped
}

/// Formats `n` the way the given field is displayed.
pub fn format_field(field: Field, n: i64) -> String {
    match field {
        Field::Quantity => format_quantity(n),
        Field::Amount => format_amount(n),
    }
}

/// Re-formats a raw value for a quantity/amount column.
///
/// Returns `None` for non-numeric input or for columns that do not hold
/// numbers.
pub fn normalize(col: usize, raw: &str) -> Option<String> {
    let field = layout::field_of(col)?;
    let value = parse_integer(raw)?;
    Some(format_field(field, value))
}
