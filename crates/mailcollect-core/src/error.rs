//! Error types for the core library.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core operations.
///
/// Reconciliation conflicts are not errors; they are reported as a
/// [`Veto`](crate::Veto) inside a [`CopyReport`](crate::CopyReport).
#[derive(Debug, Error)]
pub enum Error {
    /// Selection rules text is malformed.
    #[error("Selection rules error on line {line}: {reason}")]
    Rules {
        /// One-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    /// Selection rules are well formed but inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Account definitions file does not map accounts to addresses.
    #[error("Unable to map email addresses to accounts in {}: line {line}: {reason}", path.display())]
    AccountDefinitions {
        /// Definitions file.
        path: PathBuf,
        /// One-based line number, the line count for end-of-file problems, or
        /// zero if the file could not be read.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// A date bound could not be parsed.
    #[error("Format error in {field} date: {value:?}")]
    InvalidDate {
        /// Which bound (`earliest` or `most recent`).
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Mailbox style is not `opera` or `mbox`.
    #[error("Unsupported mailbox style: {0}")]
    UnsupportedStyle(String),

    /// The directory store scan failed part way through.
    #[error("{}", scan_message(.collected, .last, .source))]
    Scan {
        /// Emails collected before the failure.
        collected: usize,
        /// Last email collected before the failure.
        last: Option<PathBuf>,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// An archive that exists could not be read.
    #[error("Cannot read archive {}: {source}", path.display())]
    Archive {
        /// Archive file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// Writing a selected email failed for a reason other than a vanished
    /// output directory.
    #[error("Copy stopped after {written} files: cannot write {filename}: {source}")]
    Copy {
        /// Files written before the failure.
        written: usize,
        /// File that could not be written.
        filename: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::ref_option)]
fn scan_message(collected: &usize, last: &Option<PathBuf>, source: &io::Error) -> String {
    match last {
        Some(path) if *collected > 0 => format!(
            "Exception after collecting {collected} emails, last {}: {source}",
            path.display()
        ),
        _ => format!("Exception before any emails collected: {source}"),
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
