//! Mbox archive scanning.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mailcollect_mime::{Message, mbox};
use tracing::{debug, info, warn};

use super::{DateBounds, Locator};
use crate::error::{Error, Result};
use crate::filename::{DeriveFilename, date_prefix};

/// A message selected from an archive.
#[derive(Debug, Clone)]
pub struct ArchivedMessage {
    /// Selection key, also the output filename.
    ///
    /// Normally the canonical filename. When different messages derive the
    /// same filename, each key gets its message-id appended so all survive.
    pub key: String,
    /// Canonical filename derived from the headers.
    pub filename: String,
    /// `Message-ID` header, if any.
    pub message_id: Option<String>,
    /// Archive the message was first found in.
    pub archive: PathBuf,
    /// The message.
    pub message: Message,
}

impl ArchivedMessage {
    /// Where to read this message from.
    #[must_use]
    pub fn locator(&self) -> Locator {
        Locator::Archive {
            archive: self.archive.clone(),
            key: self.key.clone(),
        }
    }
}

/// Result of scanning a set of archives.
#[derive(Debug, Clone, Default)]
pub struct ArchiveScan {
    /// Selected messages in key order.
    pub messages: Vec<ArchivedMessage>,
    /// Configured archives that do not exist.
    pub missing: Vec<PathBuf>,
}

/// Messages grouped by filename, then by message-id.
type Grouped = BTreeMap<String, BTreeMap<Option<String>, (PathBuf, Message)>>;

/// Enumerates messages in mbox archives.
#[derive(Debug)]
pub struct ArchiveScanner<'a> {
    archives: &'a BTreeSet<PathBuf>,
    bounds: DateBounds,
}

impl<'a> ArchiveScanner<'a> {
    /// Creates a scanner over `archives`, read in path order.
    #[must_use]
    pub const fn new(archives: &'a BTreeSet<PathBuf>, bounds: DateBounds) -> Self {
        Self { archives, bounds }
    }

    /// Reads every archive and selects the messages within the date bounds.
    ///
    /// Messages whose filename cannot be derived are skipped. The same
    /// filename and message-id found in several archives is selected once.
    /// A missing archive is skipped with a warning and listed in
    /// [`ArchiveScan::missing`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if an existing archive cannot be read.
    pub fn scan(&self) -> Result<ArchiveScan> {
        let mut grouped = Grouped::new();
        let mut missing = Vec::new();

        for path in self.archives {
            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(archive = %path.display(), "Mail archive not found, skipping");
                    missing.push(path.clone());
                    continue;
                }
                Err(source) => {
                    return Err(Error::Archive {
                        path: path.clone(),
                        source,
                    });
                }
            };
            self.collect(path, &bytes, &mut grouped);
        }

        let messages = disambiguate(grouped);
        info!(
            archives = self.archives.len(),
            missing = missing.len(),
            messages = messages.len(),
            "Scanned mail archives"
        );
        Ok(ArchiveScan { messages, missing })
    }

    fn collect(&self, path: &Path, bytes: &[u8], grouped: &mut Grouped) {
        let mut skipped = 0usize;
        for message in mbox::messages(bytes) {
            let Some(filename) = message.derive_filename() else {
                skipped += 1;
                continue;
            };
            if !date_prefix(&filename).is_some_and(|prefix| self.bounds.contains_prefix(prefix)) {
                continue;
            }
            let message_id = message.message_id().map(str::to_string);
            grouped
                .entry(filename)
                .or_default()
                .entry(message_id)
                .or_insert_with(|| (path.to_path_buf(), message));
        }
        if skipped > 0 {
            debug!(archive = %path.display(), skipped, "Skipped messages without usable From or Date");
        }
    }
}

/// Assigns selection keys, appending the message-id where filenames collide.
fn disambiguate(grouped: Grouped) -> Vec<ArchivedMessage> {
    let mut messages = Vec::new();
    for (filename, by_id) in grouped {
        let collides = by_id.len() > 1;
        if collides {
            debug!(filename, count = by_id.len(), "Different messages share a filename");
        }
        for (message_id, (archive, message)) in by_id {
            let key = if collides {
                format!("{filename}{}", message_id.as_deref().unwrap_or_default())
            } else {
                filename.clone()
            };
            messages.push(ArchivedMessage {
                key,
                filename: filename.clone(),
                message_id,
                archive,
                message,
            });
        }
    }
    messages.sort_by(|a, b| a.key.cmp(&b.key));
    messages
}
