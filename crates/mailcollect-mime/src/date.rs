//! `Date` header parsing.

use chrono::{DateTime, FixedOffset};

/// Parses an RFC 2822 `Date` header value.
///
/// The returned timestamp keeps the UTC offset stated in the header rather
/// than being normalized, so `Mon, 1 Jan 2024 10:00:00 -0500` reads back as
/// 10:00 at `-05:00`. Trailing comments such as `(UTC)` are ignored.
///
/// Returns `None` when the value is not a complete date with a zone.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = normalize(value);
    if cleaned.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(&cleaned).ok()
}

/// Drops comments and collapses runs of whitespace to one space.
fn normalize(value: &str) -> String {
    let mut uncommented = String::with_capacity(value.len());
    let mut depth = 0usize;
    for ch in value.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => uncommented.push(ch),
            _ => {}
        }
    }

    uncommented.split_whitespace().collect::<Vec<_>>().join(" ")
}
