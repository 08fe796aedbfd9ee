//! Mbox archive reading.
//!
//! An mbox archive is a sequence of messages, each introduced by a separator
//! line starting with `From `. Splitting is done by `mail-parser`, which also
//! unescapes `>From ` body lines. Any unescaped `From ` line in a body starts a
//! new message, the same way common mbox readers treat them.

use mail_parser::mailbox::mbox::MessageIterator;

use crate::message::Message;

/// Splits an archive into the bytes of its messages.
///
/// Each message excludes its separator line and the single blank line that
/// precedes the next separator (or the end of the archive). Text before the
/// first separator is not a message and is dropped.
#[must_use]
pub fn split(archive: &[u8]) -> Vec<Vec<u8>> {
    MessageIterator::new(archive)
        .filter_map(Result::ok)
        .map(|message| without_trailing_blank(message.contents()).to_vec())
        .collect()
}

/// Splits an archive and parses each message.
#[must_use]
pub fn messages(archive: &[u8]) -> Vec<Message> {
    split(archive).into_iter().map(Message::parse).collect()
}

/// Drops the blank line that separates a message from the next one.
fn without_trailing_blank(contents: &[u8]) -> &[u8] {
    if contents == b"\n" || contents == b"\r\n" {
        &[]
    } else if contents.ends_with(b"\r\n\r\n") {
        &contents[..contents.len() - 2]
    } else if contents.ends_with(b"\n\n") {
        &contents[..contents.len() - 1]
    } else {
        contents
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ARCHIVE: &[u8] = b"From a@x.com Mon Jan  1 10:00:00 2024\n\
From: a@x.com\n\
Subject: one\n\
\n\
First body\n\
\n\
From b@y.com Mon Jan  1 11:00:00 2024\n\
From: b@y.com\n\
Subject: two\n\
\n\
Second body\n\
\n";

    #[test]
    fn test_split_two_messages() {
        let messages = split(ARCHIVE);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], b"From: a@x.com\nSubject: one\n\nFirst body\n");
        assert_eq!(messages[1], b"From: b@y.com\nSubject: two\n\nSecond body\n");
    }

    #[test]
    fn test_split_ignores_leading_text() {
        let mut archive = b"junk before any separator\n".to_vec();
        archive.extend_from_slice(ARCHIVE);
        assert_eq!(split(&archive).len(), 2);
    }

    #[test]
    fn test_split_empty_and_no_separator() {
        assert!(split(b"").is_empty());
        assert!(split(b"From: a@x.com\n\nbody\n").is_empty());
    }

    #[test]
    fn test_split_last_message_without_blank_line() {
        let messages = split(b"From a@x.com Mon Jan  1 10:00:00 2024\nFrom: a@x.com\n\nbody\n");
        assert_eq!(messages, vec![b"From: a@x.com\n\nbody\n".to_vec()]);
    }

    #[test]
    fn test_messages_parse_headers() {
        let messages = messages(ARCHIVE);
        assert_eq!(messages[1].from(), Some("b@y.com"));
        assert_eq!(messages[1].subject().as_deref(), Some("two"));
    }
}
