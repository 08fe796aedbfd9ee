//! Stored message structure.

use crate::header::Headers;

/// A stored email message.
///
/// Holds the exact bytes the message was read from together with its parsed
/// header block. The bytes are never re-serialized, so writing [`Message::raw`]
/// back out reproduces the stored message byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    raw: Vec<u8>,
}

impl Message {
    /// Parses the header block of a raw message.
    ///
    /// A leading mbox-style `From ` separator line is skipped when looking for
    /// headers but kept in the raw bytes. Header bytes that are not valid UTF-8
    /// are decoded lossily.
    #[must_use]
    pub fn parse(raw: Vec<u8>) -> Self {
        let start = if raw.starts_with(b"From ") {
            raw.iter().position(|&b| b == b'\n').map_or(raw.len(), |pos| pos + 1)
        } else {
            0
        };

        let block = &raw[start..];
        let end = header_block_end(block);
        let headers = Headers::parse(&String::from_utf8_lossy(&block[..end]));

        Self { headers, raw }
    }

    /// Returns the stored bytes of the message.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Consumes the message, returning its stored bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets the Subject header with encoded words decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.get_decoded("subject")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }
}

/// Returns the offset of the blank line that ends the header block.
fn header_block_end(block: &[u8]) -> usize {
    let mut line_start = 0;
    while line_start < block.len() {
        let line_end = block[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(block.len(), |pos| line_start + pos);
        let line = &block[line_start..line_end];
        if line.is_empty() || line == b"\r" {
            return line_start;
        }
        line_start = line_end + 1;
    }
    block.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_parse_headers() {
        let raw = b"From: sender@example.com\r\nSubject: Test\r\nMessage-ID: <1@x>\r\n\r\nHello\r\n";
        let message = Message::parse(raw.to_vec());

        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.subject().as_deref(), Some("Test"));
        assert_eq!(message.message_id(), Some("<1@x>"));
        assert_eq!(message.date(), None);
        assert_eq!(message.raw(), raw);
    }

    #[test]
    fn test_message_skips_separator_line() {
        let raw = b"From sender@example.com Mon Jan  1 10:00:00 2024\nFrom: sender@example.com\nDate: Mon, 1 Jan 2024 10:00:00 +0000\n\nBody\n";
        let message = Message::parse(raw.to_vec());

        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.date(), Some("Mon, 1 Jan 2024 10:00:00 +0000"));
        assert!(message.raw().starts_with(b"From sender@"));
    }

    #[test]
    fn test_message_body_not_parsed_as_headers() {
        let raw = b"Subject: One\n\nFrom: not-a-header@example.com\n";
        let message = Message::parse(raw.to_vec());
        assert_eq!(message.from(), None);
    }

    #[test]
    fn test_message_non_utf8_header() {
        let mut raw = b"Subject: caf".to_vec();
        raw.push(0xE9);
        raw.extend_from_slice(b"\nFrom: a@x.com\n\nbody");
        let message = Message::parse(raw.clone());
        assert_eq!(message.from(), Some("a@x.com"));
        assert_eq!(message.into_raw(), raw);
    }

    #[test]
    fn test_header_block_end() {
        assert_eq!(header_block_end(b"A: b\r\n\r\nbody"), 6);
        assert_eq!(header_block_end(b"A: b\n\nbody"), 5);
        assert_eq!(header_block_end(b"A: b\n"), 5);
    }
}
