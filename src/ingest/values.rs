//! Cell-level parsing of the catalog export.
//!
//! The export decorates cells as spreadsheet formulas (`="value"`) and uses
//! German number and date formats.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Why a cell could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueError {
    Empty,
    Invalid,
}

/// Strip surrounding whitespace and the `="..."` decoration.
pub fn clean_cell(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 3 && trimmed.starts_with("=\"") && trimmed.ends_with('"') {
        trimmed[2..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// A cleaned text cell, `None` when blank.
pub fn text(raw: &str) -> Option<String> {
    let cleaned = clean_cell(raw);
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Parse an amount written as `1.234,56`.
///
/// Periods are thousands separators and the comma is the decimal mark.
/// Negative amounts are rejected.
pub fn parse_amount(raw: &str) -> Result<Decimal, ValueError> {
    let cleaned = clean_cell(raw);
    if cleaned.is_empty() {
        return Err(ValueError::Empty);
    }

    let normalized: String = cleaned
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let value = Decimal::from_str(&normalized).map_err(|_| ValueError::Invalid)?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValueError::Invalid);
    }

    Ok(value)
}

/// Parse a day-first date written as `15.03.2019`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValueError> {
    let cleaned = clean_cell(raw);
    if cleaned.is_empty() {
        return Err(ValueError::Empty);
    }

    NaiveDate::parse_from_str(cleaned, "%d.%m.%Y").map_err(|_| ValueError::Invalid)
}
