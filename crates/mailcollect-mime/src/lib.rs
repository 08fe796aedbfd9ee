//! # mailcollect-mime
//!
//! Message-level parsing for emails held in a local mail store.
//!
//! ## Features
//!
//! - **Header parsing**: Folded header blocks with case-insensitive lookup
//! - **Addresses**: Extract the bare mailbox from `From`-style header values
//! - **Dates**: RFC 2822 dates that keep the sender's own UTC offset
//! - **Encoded words**: RFC 2047 decoding for display headers such as `Subject`
//! - **Mbox archives**: Split a multi-message archive into its messages
//!
//! ## Quick Start
//!
//! ```
//! use mailcollect_mime::{Message, parse_address, parse_date};
//!
//! let raw = b"From: Alice <alice@example.com>\r\n\
//!             Date: Mon, 1 Jan 2024 10:00:00 +0100\r\n\
//!             Subject: Minutes\r\n\
//!             \r\n\
//!             Body\r\n";
//!
//! let message = Message::parse(raw.to_vec());
//! assert_eq!(message.from().and_then(parse_address).as_deref(), Some("alice@example.com"));
//!
//! let sent = message.date().and_then(parse_date).unwrap();
//! assert_eq!(sent.offset().local_minus_utc(), 3600);
//! ```
//!
//! ### Reading an mbox archive
//!
//! ```
//! use mailcollect_mime::mbox;
//!
//! let archive = b"From alice@example.com Mon Jan  1 10:00:00 2024\n\
//!                 From: alice@example.com\n\
//!                 \n\
//!                 First\n\
//!                 \n\
//!                 From bob@example.com Mon Jan  1 11:00:00 2024\n\
//!                 From: bob@example.com\n\
//!                 \n\
//!                 Second\n";
//!
//! let messages = mbox::split(archive);
//! assert_eq!(messages.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod date;
mod error;
mod header;
mod message;

pub mod encoding;
pub mod mbox;

pub use address::parse_address;
pub use date::parse_date;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::Message;
