//! Date bound parsing.

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Accepted date bound spellings, tried in order.
const FORMATS: &[&str] = &[
    "%Y-%m-%d", // 2006-11-30
    "%Y/%m/%d", // 2006/11/30
    "%d %b %Y", // 30 Nov 2006
    "%d %B %Y", // 30 November 2006
    "%b %d %Y", // Nov 30 2006
    "%B %d %Y", // November 30 2006
    "%d-%m-%Y", // 30-11-2006
    "%d/%m/%Y", // 30/11/2006
];

/// Parses an `earliestfromdate` or `mostrecentfromdate` value.
///
/// `field` names the bound in the error.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the value matches none of the accepted
/// formats or is not a calendar date.
pub fn parse_date_bound(field: &'static str, value: &str) -> Result<NaiveDate> {
    let invalid = || Error::InvalidDate {
        field,
        value: value.to_string(),
    };

    // 20061130
    let compact = value.trim();
    if compact.len() == 8 && compact.bytes().all(|b| b.is_ascii_digit()) {
        let part = |range: std::ops::Range<usize>| compact[range].parse::<u32>().ok();
        let year = compact[..4].parse::<i32>().ok();
        return match (year, part(4..6), part(6..8)) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid),
            _ => Err(invalid()),
        };
    }

    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let normalized = normalized.replace(',', "");

    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
        .ok_or_else(invalid)
}
