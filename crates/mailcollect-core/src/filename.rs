//! Canonical output filenames.
//!
//! A stored email is named `YYYYMMDDhhmmss<from-address><±HHHMM>.mbs`. The
//! timestamp is the send time in the sender's own UTC offset and the suffix
//! repeats that offset as a sign, three hour digits and two minute digits:
//!
//! ```text
//! 20240101100000a@x.com+00000.mbs
//! 20240315183000bob@example.org-00500.mbs
//! ```
//!
//! Names sort chronologically within one sender offset, and re-deriving the
//! name from the same `From` and `Date` values always gives the same string.
//! Anything that checks whether an email is already stored must use
//! [`derive_filename`].

use chrono::{DateTime, FixedOffset};
use mailcollect_mime::{Message, parse_address, parse_date};

/// Extension shared by every stored email file.
pub const FILENAME_SUFFIX: &str = ".mbs";

/// Length of the `YYYYMMDD` prefix used for date-range checks.
pub const DATE_PREFIX_LEN: usize = 8;

/// Derives the canonical filename from raw `From` and `Date` header values.
///
/// Returns `None` when either header is missing or unparseable, or when the
/// address contains a path separator. Callers drop such emails from the
/// selection instead of failing the batch.
#[must_use]
pub fn derive_filename(from_header: Option<&str>, date_header: Option<&str>) -> Option<String> {
    let sent = parse_date(date_header?)?;
    let from = parse_address(from_header?)?;
    if from.contains(['/', '\\', '\0']) {
        return None;
    }
    Some(format_filename(&from, &sent))
}

/// Formats a filename from an already parsed address and send time.
#[must_use]
pub fn format_filename(from: &str, sent: &DateTime<FixedOffset>) -> String {
    let offset = sent.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.unsigned_abs() / 60;
    format!(
        "{}{from}{sign}{:03}{:02}{FILENAME_SUFFIX}",
        sent.format("%Y%m%d%H%M%S"),
        minutes / 60,
        minutes % 60,
    )
}

/// Returns the `YYYYMMDD` prefix of a canonical filename.
#[must_use]
pub fn date_prefix(filename: &str) -> Option<&str> {
    filename
        .get(..DATE_PREFIX_LEN)
        .filter(|prefix| prefix.bytes().all(|b| b.is_ascii_digit()))
}

/// Capability of a parsed message to name its own stored copy.
pub trait DeriveFilename {
    /// Derives the canonical filename, or `None` if the headers do not allow it.
    fn derive_filename(&self) -> Option<String>;
}

impl DeriveFilename for Message {
    fn derive_filename(&self) -> Option<String> {
        derive_filename(self.from(), self.date())
    }
}
