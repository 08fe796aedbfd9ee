//! Candidate enumeration from the two supported store layouts.
//!
//! - [`DirectoryScanner`] walks an Opera store, one file per message.
//! - [`ArchiveScanner`] reads mbox archives, many messages per file.
//!
//! Both apply the same inclusive [`DateBounds`] and produce candidates in a
//! stable order.

mod archive;
mod directory;

pub use archive::{ArchiveScan, ArchiveScanner, ArchivedMessage};
pub use directory::{DirectoryScanner, StoredFile};

use std::path::PathBuf;

use chrono::{Months, NaiveDate};

/// Where a selected email's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Locator {
    /// A one-message file in a directory store.
    File(PathBuf),
    /// A message inside an archive, by its selection key.
    Archive {
        /// Archive the message was read from.
        archive: PathBuf,
        /// Selection key (the output filename).
        key: String,
    },
}

/// Inclusive date range for selection. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    /// Earliest date selected.
    pub earliest: Option<NaiveDate>,
    /// Most recent date selected.
    pub most_recent: Option<NaiveDate>,
}

impl DateBounds {
    /// Creates bounds from optional ends.
    #[must_use]
    pub const fn new(earliest: Option<NaiveDate>, most_recent: Option<NaiveDate>) -> Self {
        Self { earliest, most_recent }
    }

    /// Returns `true` if `date` lies within the bounds.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.earliest.is_none_or(|earliest| date >= earliest)
            && self.most_recent.is_none_or(|most_recent| date <= most_recent)
    }

    /// Returns `true` if a `YYYYMMDD` filename prefix lies within the bounds.
    ///
    /// Compares digit strings, which order the same way as the dates.
    #[must_use]
    pub fn contains_prefix(&self, prefix: &str) -> bool {
        let compact = |date: NaiveDate| date.format("%Y%m%d").to_string();
        self.earliest.is_none_or(|earliest| prefix >= compact(earliest).as_str())
            && self.most_recent.is_none_or(|most_recent| prefix <= compact(most_recent).as_str())
    }

    /// Fills open ends for a store whose latest dated directory is `latest`.
    ///
    /// An open most-recent end becomes `latest`. An open earliest end becomes
    /// one year before the effective most-recent date, capped at `latest`,
    /// so by default the most recent year of mail is selected.
    #[must_use]
    pub fn resolve(&self, latest: NaiveDate) -> ResolvedBounds {
        let most_recent = self.most_recent.unwrap_or(latest);
        let earliest = self.earliest.unwrap_or_else(|| {
            let anchor = most_recent.min(latest);
            anchor.checked_sub_months(Months::new(12)).unwrap_or(NaiveDate::MIN)
        });
        ResolvedBounds { earliest, most_recent }
    }
}

/// Date bounds with both ends fixed, used while walking one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBounds {
    /// Earliest date selected.
    pub earliest: NaiveDate,
    /// Most recent date selected.
    pub most_recent: NaiveDate,
}

impl ResolvedBounds {
    /// Returns `true` once a descending walk has passed the earliest date.
    #[must_use]
    pub fn is_below_earliest(&self, date: NaiveDate) -> bool {
        date < self.earliest
    }

    /// Returns `true` for dates newer than the most recent date.
    #[must_use]
    pub fn is_above_most_recent(&self, date: NaiveDate) -> bool {
        date > self.most_recent
    }
}
