//! Header block handling.

use crate::encoding::decode_rfc2047;
use std::collections::HashMap;

/// Collection of email headers.
///
/// Names are matched case-insensitively. Values keep their original text with
/// folded continuation lines joined by a single space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Gets the first value for a header with RFC 2047 encoded words decoded.
    ///
    /// Falls back to the raw value when the encoded words cannot be decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|raw| decode_rfc2047(raw).unwrap_or_else(|_| raw.to_string()))
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns `true` when no headers were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Parses headers from the text of a header block.
    ///
    /// Parsing stops at the first empty line. Lines that are neither a
    /// `Name: value` pair nor a continuation are ignored, since stored mail
    /// routinely carries broken headers and one bad line must not hide the
    /// `From` and `Date` headers around it.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            // Continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_some() {
                    current_value.push(' ');
                    current_value.push_str(line.trim());
                }
                continue;
            }

            if let Some(name) = current_name.take() {
                headers.add(name, current_value.trim().to_string());
                current_value.clear();
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() && !name.contains(char::is_whitespace) {
                    current_name = Some(name.to_string());
                    current_value = value.trim().to_string();
                }
            }
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim().to_string());
        }

        headers
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Message-ID", "<1@example.com>");
        assert_eq!(headers.get("Message-ID"), Some("<1@example.com>"));
        assert_eq!(headers.get("message-id"), Some("<1@example.com>"));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Date: Mon, 1 Jan 2024\r\n",
            " 10:00:00 +0000\r\n",
            "Subject: Test Message\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Date"), Some("Mon, 1 Jan 2024 10:00:00 +0000"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(headers.get("Body"), None);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_headers_parse_skips_malformed_lines() {
        let text = "garbage line\nFrom: a@example.com\nbad name: x\nTo: b@example.com\n";
        let headers = Headers::parse(text);
        assert_eq!(headers.get("from"), Some("a@example.com"));
        assert_eq!(headers.get("to"), Some("b@example.com"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_headers_repeated() {
        let headers = Headers::parse("Received: one\nReceived: two\n");
        assert_eq!(headers.get_all("received"), vec!["one", "two"]);
        assert_eq!(headers.get("received"), Some("one"));
    }

    #[test]
    fn test_headers_get_decoded() {
        let headers = Headers::parse("Subject: =?utf-8?B?SMOpbGxv?= there\n");
        assert_eq!(headers.get_decoded("subject").as_deref(), Some("Héllo there"));
    }
}
