//! Reconciliation of a selection with the output directory.
//!
//! Every selected email is classified against what the output directory
//! already holds. Copying goes ahead only if it cannot overwrite or
//! interleave with what is there:
//!
//! - no selected email differs from a stored file of the same name,
//! - no excluded email is stored,
//! - the new emails' date range does not overlap the stored range.
//!
//! Otherwise the whole copy is refused with a [`Veto`].

mod report;

pub use report::{CopyReport, Veto};

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Where a selected email's bytes are read from when copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source<'a> {
    /// A message file in a directory store.
    File(&'a Path),
    /// A message already in memory.
    Memory(&'a [u8]),
}

impl<'a> Source<'a> {
    fn read(self) -> io::Result<Cow<'a, [u8]>> {
        match self {
            Self::File(path) => fs::read(path).map(Cow::Owned),
            Self::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }

    fn same_as(self, stored: &Path) -> io::Result<bool> {
        if let Self::File(path) = self
            && fs::metadata(path)?.len() != fs::metadata(stored)?.len()
        {
            return Ok(false);
        }
        Ok(*self.read()? == *fs::read(stored)?)
    }

    fn same_bytes(self, other: Self) -> io::Result<bool> {
        Ok(*self.read()? == *other.read()?)
    }
}

/// A selected email to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyItem<'a> {
    /// Output filename.
    pub filename: &'a str,
    /// Where the bytes come from.
    pub source: Source<'a>,
}

/// How a selected email relates to the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Classification {
    /// Excluded and not stored.
    ExcludedAbsent,
    /// Excluded but stored.
    ExcludedPresent,
    /// Not stored yet.
    New,
    /// Stored with identical bytes.
    Equal,
    /// Stored, or selected more than once, with different bytes.
    Changed,
}

/// A classified selection, ready to copy.
#[derive(Debug)]
pub struct Reconciliation<'a> {
    output_dir: PathBuf,
    stored: BTreeSet<String>,
    entries: Vec<(CopyItem<'a>, Classification)>,
    index: HashMap<&'a str, usize>,
}

impl<'a> Reconciliation<'a> {
    /// Classifies `items` against `output_dir`.
    ///
    /// A missing output directory counts as empty and is left alone. When
    /// several items share a filename and their bytes differ, all of them are
    /// [`Changed`](Classification::Changed).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the output directory cannot be listed, or a
    /// source or stored file cannot be read.
    pub fn classify(
        items: impl IntoIterator<Item = CopyItem<'a>>,
        output_dir: &Path,
        exclude: &BTreeSet<String>,
    ) -> Result<Self> {
        let mut stored = BTreeSet::new();
        match fs::read_dir(output_dir) {
            Ok(listing) => {
                for entry in listing {
                    stored.insert(entry?.file_name().to_string_lossy().into_owned());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(output = %output_dir.display(), "Output directory does not exist yet");
            }
            Err(e) => return Err(e.into()),
        }

        let mut entries: Vec<(CopyItem<'a>, Classification)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for item in items {
            let present = stored.contains(item.filename);
            let excluded = exclude.contains(item.filename);
            let mut class = match (excluded, present) {
                (true, false) => Classification::ExcludedAbsent,
                (true, true) => Classification::ExcludedPresent,
                (false, false) => Classification::New,
                (false, true) => {
                    if item.source.same_as(&output_dir.join(item.filename))? {
                        Classification::Equal
                    } else {
                        Classification::Changed
                    }
                }
            };

            if let Some(&first) = index.get(item.filename) {
                let earlier = entries[first].0;
                if !excluded && !item.source.same_bytes(earlier.source)? {
                    debug!(filename = item.filename, "Emails with the same filename differ");
                    class = Classification::Changed;
                    entries[first].1 = Classification::Changed;
                }
            } else {
                index.insert(item.filename, entries.len());
            }
            entries.push((item, class));
        }

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            stored,
            entries,
            index,
        })
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Names already in the output directory.
    #[must_use]
    pub const fn stored(&self) -> &BTreeSet<String> {
        &self.stored
    }

    /// Classification of a selected filename.
    #[must_use]
    pub fn classification(&self, filename: &str) -> Option<Classification> {
        self.index.get(filename).map(|&i| self.entries[i].1)
    }

    /// Filenames with the given classification, in selection order.
    ///
    /// A filename selected more than once is listed once.
    #[must_use]
    pub fn filenames(&self, class: Classification) -> Vec<&'a str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .filter(|(item, c)| *c == class && seen.insert(item.filename))
            .map(|(item, _)| item.filename)
            .collect()
    }

    /// Number of selected emails with the given classification.
    #[must_use]
    pub fn count(&self, class: Classification) -> usize {
        self.entries.iter().filter(|(_, c)| *c == class).count()
    }

    /// Returns the reason copying must not go ahead, if any.
    ///
    /// Checked in order: changed emails, stored exclusions, then date range
    /// overlap between the new emails and everything already stored.
    #[must_use]
    pub fn veto(&self) -> Option<Veto> {
        let changed = self.filenames(Classification::Changed);
        if !changed.is_empty() {
            return Some(Veto::Changed(to_owned(changed)));
        }

        let excluded = self.filenames(Classification::ExcludedPresent);
        if !excluded.is_empty() {
            return Some(Veto::ExcludedPresent(to_owned(excluded)));
        }

        let new = self.filenames(Classification::New);
        let (Some(new_low), Some(new_high)) = (new.iter().min(), new.iter().max()) else {
            return None;
        };
        let (Some(stored_low), Some(stored_high)) = (self.stored.first(), self.stored.last()) else {
            return None;
        };
        if *new_low < stored_high.as_str() && *new_high > stored_low.as_str() {
            return Some(Veto::RangeOverlap {
                stored: (stored_low.clone(), stored_high.clone()),
                new: ((*new_low).to_string(), (*new_high).to_string()),
            });
        }
        None
    }

    /// Writes the new emails unless a [`Veto`] applies.
    ///
    /// The output directory is created before the first write. A filename
    /// selected more than once is written once.
    ///
    /// The directory listing taken by [`classify`](Self::classify) is not
    /// refreshed, so files created by another writer since then can be
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Copy`] if the output directory cannot be created, a
    /// source cannot be read, or a write fails for any reason other than a
    /// missing directory. Files written before
    /// the failure stay written.
    pub fn execute(self) -> Result<CopyReport> {
        if let Some(veto) = self.veto() {
            warn!(%veto, "Copy refused");
            return Ok(CopyReport::Refused(veto));
        }

        let mut written = 0;
        let mut failed = Vec::new();
        let mut handled = BTreeSet::new();
        for (item, class) in &self.entries {
            if *class != Classification::New || !handled.insert(item.filename) {
                continue;
            }
            let copy_error = move |source| Error::Copy {
                written,
                filename: item.filename.to_string(),
                source,
            };
            if handled.len() == 1 {
                fs::create_dir_all(&self.output_dir).map_err(copy_error)?;
            }
            let bytes = item.source.read().map_err(copy_error)?;
            match fs::write(self.output_dir.join(item.filename), &bytes) {
                Ok(()) => written += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(filename = item.filename, error = %e, "Cannot write email, skipping");
                    failed.push(item.filename.to_string());
                }
                Err(e) => return Err(copy_error(e)),
            }
        }

        info!(
            written,
            failed = failed.len(),
            equal = self.count(Classification::Equal),
            output = %self.output_dir.display(),
            "Copied selected emails"
        );
        Ok(CopyReport::Copied { written, failed })
    }
}

fn to_owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::needless_collect)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn items<'a>(emails: &'a [(&'a str, &'a str)]) -> Vec<CopyItem<'a>> {
        emails
            .iter()
            .map(|(filename, body)| CopyItem {
                filename,
                source: Source::Memory(body.as_bytes()),
            })
            .collect()
    }

    fn copy(emails: &[(&str, &str)], dir: &Path, exclude: &BTreeSet<String>) -> CopyReport {
        Reconciliation::classify(items(emails), dir, exclude)
            .unwrap()
            .execute()
            .unwrap()
    }

    const EMAILS: &[(&str, &str)] = &[
        ("20240101100000a@x.com+00000.mbs", "one"),
        ("20240102100000b@x.com+00000.mbs", "two"),
        ("20240103100000a@x.com+00000.mbs", "three"),
    ];

    #[test]
    fn test_copy_into_missing_directory_then_again() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("collected");
        let none = BTreeSet::new();

        let report = copy(EMAILS, &out, &none);
        assert_eq!(report.written(), Some(3));
        assert_eq!(fs::read(out.join(EMAILS[1].0)).unwrap(), b"two");

        let again = Reconciliation::classify(items(EMAILS), &out, &none).unwrap();
        assert_eq!(again.count(Classification::Equal), 3);
        assert_eq!(again.veto(), None);
        assert_eq!(again.execute().unwrap().written(), Some(0));
    }

    #[test]
    fn test_changed_email_refuses_copy() {
        let temp = TempDir::new().unwrap();
        let none = BTreeSet::new();
        copy(&EMAILS[..2], temp.path(), &none);
        fs::write(temp.path().join(EMAILS[0].0), "edited").unwrap();

        let report = copy(EMAILS, temp.path(), &none);
        assert_eq!(
            report,
            CopyReport::Refused(Veto::Changed(vec![EMAILS[0].0.to_string()]))
        );
        assert!(!temp.path().join(EMAILS[2].0).exists());
    }

    #[test]
    fn test_stored_exclusion_refuses_copy() {
        let temp = TempDir::new().unwrap();
        let none = BTreeSet::new();
        copy(&EMAILS[..1], temp.path(), &none);

        let exclude = BTreeSet::from([EMAILS[0].0.to_string()]);
        let report = copy(&EMAILS[..2], temp.path(), &exclude);
        assert!(matches!(report, CopyReport::Refused(Veto::ExcludedPresent(_))));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_absent_exclusion_not_copied() {
        let temp = TempDir::new().unwrap();
        let exclude = BTreeSet::from([EMAILS[1].0.to_string()]);
        let reconciliation = Reconciliation::classify(items(EMAILS), temp.path(), &exclude).unwrap();
        assert_eq!(
            reconciliation.classification(EMAILS[1].0),
            Some(Classification::ExcludedAbsent)
        );
        assert_eq!(reconciliation.execute().unwrap().written(), Some(2));
        assert!(!temp.path().join(EMAILS[1].0).exists());
    }

    #[test]
    fn test_overlapping_range_refuses_copy() {
        let temp = TempDir::new().unwrap();
        let none = BTreeSet::new();
        copy(&[EMAILS[0], EMAILS[2]], temp.path(), &none);

        let report = copy(&EMAILS[1..2], temp.path(), &none);
        assert_eq!(
            report,
            CopyReport::Refused(Veto::RangeOverlap {
                stored: (EMAILS[0].0.to_string(), EMAILS[2].0.to_string()),
                new: (EMAILS[1].0.to_string(), EMAILS[1].0.to_string()),
            })
        );
    }

    #[test]
    fn test_adjacent_ranges_copy() {
        let temp = TempDir::new().unwrap();
        let none = BTreeSet::new();
        copy(&EMAILS[1..], temp.path(), &none);

        let report = copy(EMAILS, temp.path(), &none);
        assert_eq!(report.written(), Some(1));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_file_source() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("7");
        fs::write(&source, "stored").unwrap();
        let out = temp.path().join("out");
        let item = CopyItem {
            filename: "20240101100000a@x.com+00000.mbs",
            source: Source::File(&source),
        };

        let report = Reconciliation::classify([item], &out, &BTreeSet::new())
            .unwrap()
            .execute()
            .unwrap();
        assert_eq!(report.written(), Some(1));

        let again = Reconciliation::classify([item], &out, &BTreeSet::new()).unwrap();
        assert_eq!(again.classification(item.filename), Some(Classification::Equal));

        fs::write(&source, "stored, then edited").unwrap();
        let changed = Reconciliation::classify([item], &out, &BTreeSet::new()).unwrap();
        assert_eq!(changed.classification(item.filename), Some(Classification::Changed));
    }

    #[test]
    fn test_missing_directory_is_per_file_failure() {
        let temp = TempDir::new().unwrap();
        let emails = [("sub/20240101100000a@x.com+00000.mbs", "one")];
        let report = copy(&emails, temp.path(), &BTreeSet::new());
        assert_eq!(
            report,
            CopyReport::Copied {
                written: 0,
                failed: vec![emails[0].0.to_string()],
            }
        );
    }

    #[test]
    fn test_classify_leaves_missing_directory_absent() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("not yet");
        let reconciliation = Reconciliation::classify(items(EMAILS), &out, &BTreeSet::new()).unwrap();
        assert_eq!(reconciliation.count(Classification::New), 3);
        assert!(reconciliation.stored().is_empty());
        assert!(!out.exists());
    }

    #[test]
    fn test_refused_copy_leaves_missing_directory_absent() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("not yet");
        let emails = [(EMAILS[0].0, "one"), (EMAILS[0].0, "another one")];
        let report = copy(&emails, &out, &BTreeSet::new());
        assert!(report.veto().is_some());
        assert!(!out.exists());
    }

    #[test]
    fn test_same_filename_different_bytes_refuses_copy() {
        let temp = TempDir::new().unwrap();
        let emails = [
            (EMAILS[0].0, "Received: by a\n\none"),
            (EMAILS[1].0, "two"),
            (EMAILS[0].0, "Received: by b\n\none"),
        ];
        let reconciliation = Reconciliation::classify(items(&emails), temp.path(), &BTreeSet::new()).unwrap();
        assert_eq!(reconciliation.classification(EMAILS[0].0), Some(Classification::Changed));
        assert_eq!(reconciliation.count(Classification::Changed), 2);

        let report = reconciliation.execute().unwrap();
        assert_eq!(
            report,
            CopyReport::Refused(Veto::Changed(vec![EMAILS[0].0.to_string()]))
        );
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_same_filename_same_bytes_written_once() {
        let temp = TempDir::new().unwrap();
        let emails = [EMAILS[0], EMAILS[1], EMAILS[0]];
        let reconciliation = Reconciliation::classify(items(&emails), temp.path(), &BTreeSet::new()).unwrap();
        assert_eq!(reconciliation.count(Classification::New), 3);
        assert_eq!(reconciliation.filenames(Classification::New), vec![EMAILS[0].0, EMAILS[1].0]);
        assert_eq!(reconciliation.execute().unwrap().written(), Some(2));
        assert_eq!(fs::read(temp.path().join(EMAILS[0].0)).unwrap(), b"one");
    }

    #[test]
    fn test_duplicate_of_stored_email_differs() {
        let temp = TempDir::new().unwrap();
        let none = BTreeSet::new();
        copy(&EMAILS[..1], temp.path(), &none);

        let emails = [EMAILS[0], (EMAILS[0].0, "one, resent")];
        let reconciliation = Reconciliation::classify(items(&emails), temp.path(), &none).unwrap();
        assert_eq!(reconciliation.classification(EMAILS[0].0), Some(Classification::Changed));
        assert!(matches!(reconciliation.veto(), Some(Veto::Changed(names)) if names.len() == 1));
    }

    #[test]
    fn test_classification_of_unselected_filename() {
        let temp = TempDir::new().unwrap();
        let reconciliation = Reconciliation::classify(items(EMAILS), temp.path(), &BTreeSet::new()).unwrap();
        assert_eq!(reconciliation.classification(EMAILS[2].0), Some(Classification::New));
        assert_eq!(reconciliation.classification("20250101100000z@x.com+00000.mbs"), None);
    }
}
