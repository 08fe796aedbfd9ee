//! Selected email records.

use chrono::{DateTime, FixedOffset};
use mailcollect_mime::{Message, parse_address, parse_date};

use crate::scan::Locator;

/// Summary of a selected email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    /// Sender address.
    pub from_address: String,
    /// Send time in the sender's offset.
    pub sent_at: DateTime<FixedOffset>,
    /// Decoded subject, empty if absent.
    pub subject: String,
    /// `Message-ID` header, if any.
    pub message_id: Option<String>,
    /// Output filename.
    pub filename: String,
    /// Where the bytes come from.
    pub locator: Locator,
}

impl EmailRecord {
    /// Summarizes a message that will be stored as `filename`.
    ///
    /// Returns `None` if the `From` or `Date` header does not parse.
    #[must_use]
    pub fn from_message(message: &Message, filename: String, locator: Locator) -> Option<Self> {
        Some(Self {
            from_address: parse_address(message.from()?)?,
            sent_at: parse_date(message.date()?)?,
            subject: message.subject().unwrap_or_default(),
            message_id: message.message_id().map(str::to_string),
            filename,
            locator,
        })
    }
}

/// A selected email with its message.
#[derive(Debug, Clone)]
pub struct SelectedEmail {
    /// Summary.
    pub record: EmailRecord,
    /// Parsed message holding the bytes to copy.
    pub message: Message,
}
