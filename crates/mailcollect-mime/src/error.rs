//! Error types for message parsing.

use std::string::FromUtf8Error;

/// Result type alias for message parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message parsing error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Unsupported character set in an encoded word.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}
