//! Selection orchestration.
//!
//! An [`EmailCollector`] owns one selection rules document. It parses the
//! document into [`SelectionCriteria`], runs the scanner and sender filter
//! for the configured store once, and reconciles the result with the output
//! directory on request.
//!
//! ```no_run
//! use mailcollect_core::EmailCollector;
//!
//! let mut collector = EmailCollector::load("collected.conf".as_ref())?;
//! collector.try_parse()?;
//! for record in collector.selected_candidates()? {
//!     println!("{} {}", record.filename, record.subject);
//! }
//! let report = collector.copy_selection()?;
//! println!("{:?} files written", report.written());
//! # Ok::<(), mailcollect_core::Error>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use mailcollect_mime::Message;
use tracing::{debug, error, info};

use crate::account::AccountMap;
use crate::criteria::{MailStore, SelectionCriteria, SelectionRules, rules};
use crate::error::{Error, Result};
use crate::filter::{SenderFilter, SenderPolicy};
use crate::reconcile::{CopyItem, CopyReport, Reconciliation, Source};
use crate::record::{EmailRecord, SelectedEmail};
use crate::scan::{ArchiveScanner, DirectoryScanner, Locator};

/// Mapping from a selected email's locator to its output filename.
pub type FilenameMap = BTreeMap<Locator, String>;

/// The emails selected by a set of criteria.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    records: Vec<EmailRecord>,
    messages: Vec<Message>,
    filenames: FilenameMap,
    missing_archives: Vec<PathBuf>,
}

impl Selection {
    /// Runs the scanner and sender filter for the criteria's store.
    ///
    /// # Errors
    ///
    /// Returns an error if the account definitions are unusable, the
    /// directory store scan fails or an existing archive cannot be read.
    pub fn gather(criteria: &SelectionCriteria) -> Result<Self> {
        let filter = SenderFilter::new(SenderPolicy::from_senders(criteria.senders.as_ref()));
        let bounds = criteria.date_bounds();

        let selection = match &criteria.store {
            MailStore::Opera {
                store,
                account_defs,
                accounts,
            } => {
                let definitions = AccountMap::load(account_defs)?;
                let files = DirectoryScanner::new(store, &definitions, accounts.as_ref(), bounds).scan()?;
                Self::new(filter.filter_stored(files, &definitions)?, Vec::new())
            }
            MailStore::Mbox { archives } => {
                let scan = ArchiveScanner::new(archives, bounds).scan()?;
                let emails = filter
                    .filter_archived(scan.messages)
                    .into_iter()
                    .filter_map(|archived| {
                        let record = EmailRecord::from_message(
                            &archived.message,
                            archived.key.clone(),
                            archived.locator(),
                        )?;
                        Some(SelectedEmail {
                            record,
                            message: archived.message,
                        })
                    })
                    .collect();
                Self::new(emails, scan.missing)
            }
        };

        info!(
            style = %criteria.style(),
            selected = selection.records.len(),
            "Selected emails"
        );
        Ok(selection)
    }

    fn new(emails: Vec<SelectedEmail>, missing_archives: Vec<PathBuf>) -> Self {
        let mut selection = Self {
            missing_archives,
            ..Self::default()
        };
        for SelectedEmail { record, message } in emails {
            selection
                .filenames
                .insert(record.locator.clone(), record.filename.clone());
            selection.records.push(record);
            selection.messages.push(message);
        }
        selection
    }

    /// Selected email summaries, in selection order.
    #[must_use]
    pub fn records(&self) -> &[EmailRecord] {
        &self.records
    }

    /// Selected messages, in the same order as [`records`](Self::records).
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Output filename of each selected email.
    #[must_use]
    pub const fn filenames(&self) -> &FilenameMap {
        &self.filenames
    }

    /// Configured archives that were not found.
    #[must_use]
    pub fn missing_archives(&self) -> &[PathBuf] {
        &self.missing_archives
    }

    fn copy_items(&self) -> impl Iterator<Item = CopyItem<'_>> {
        self.records.iter().zip(&self.messages).map(|(record, message)| CopyItem {
            filename: &record.filename,
            source: match &record.locator {
                Locator::File(path) => Source::File(path),
                Locator::Archive { .. } => Source::Memory(message.raw()),
            },
        })
    }
}

/// Orchestrates selection and copying for one rules document.
#[derive(Debug, Clone)]
pub struct EmailCollector {
    directory: PathBuf,
    text: String,
    criteria: Option<SelectionCriteria>,
    selection: Option<Selection>,
}

impl EmailCollector {
    /// Creates a collector for rules `text` whose relative paths resolve
    /// against `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            text: text.into(),
            criteria: None,
            selection: None,
        }
    }

    /// Creates a collector from criteria built in code.
    ///
    /// The rules text starts empty and only records exclusion changes.
    #[must_use]
    pub fn from_criteria(criteria: SelectionCriteria) -> Self {
        Self {
            directory: PathBuf::new(),
            text: String::new(),
            criteria: Some(criteria),
            selection: None,
        }
    }

    /// Reads a rules file. Relative paths resolve against its directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(directory, text))
    }

    /// The rules text, including exclusion edits.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parses the rules text, logging the reason on failure.
    ///
    /// Returns `true` if the criteria are usable.
    pub fn parse(&mut self) -> bool {
        match self.try_parse() {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Selection rules rejected");
                false
            }
        }
    }

    /// Parses the rules text into criteria.
    ///
    /// Any earlier selection is discarded. On failure no criteria are kept.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn try_parse(&mut self) -> Result<&SelectionCriteria> {
        self.criteria = None;
        self.selection = None;
        let rules = SelectionRules::parse(&self.text)?;
        let criteria = SelectionCriteria::from_rules(&rules, &self.directory)?;
        debug!(style = %criteria.style(), output = %criteria.output_dir.display(), "Parsed selection rules");
        Ok(self.criteria.insert(criteria))
    }

    /// The parsed criteria.
    #[must_use]
    pub const fn criteria(&self) -> Option<&SelectionCriteria> {
        self.criteria.as_ref()
    }

    /// Runs the selection once and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the rules have not been parsed, or the
    /// error that stopped the selection.
    pub fn selection(&mut self) -> Result<&Selection> {
        let selection = match self.selection.take() {
            Some(selection) => selection,
            None => Selection::gather(self.require_criteria()?)?,
        };
        Ok(self.selection.insert(selection))
    }

    /// Selected email summaries, in selection order.
    ///
    /// # Errors
    ///
    /// See [`selection`](Self::selection).
    pub fn selected_candidates(&mut self) -> Result<&[EmailRecord]> {
        Ok(self.selection()?.records())
    }

    /// Selected messages, in the same order as the candidates.
    ///
    /// # Errors
    ///
    /// See [`selection`](Self::selection).
    pub fn selected_message_bodies(&mut self) -> Result<&[Message]> {
        Ok(self.selection()?.messages())
    }

    /// Output filename of a selected email, if the selection has run.
    #[must_use]
    pub fn filename_for(&self, locator: &Locator) -> Option<&str> {
        self.selection
            .as_ref()?
            .filenames()
            .get(locator)
            .map(String::as_str)
    }

    /// Archives that were not found by the last selection.
    #[must_use]
    pub fn missing_archives(&self) -> &[PathBuf] {
        self.selection
            .as_ref()
            .map(Selection::missing_archives)
            .unwrap_or_default()
    }

    /// Filenames currently excluded from copying.
    #[must_use]
    pub fn excluded_filenames(&self) -> BTreeSet<&str> {
        self.criteria
            .iter()
            .flat_map(|criteria| criteria.exclusions().iter().map(String::as_str))
            .collect()
    }

    /// Directory the selection is copied into.
    #[must_use]
    pub fn output_directory(&self) -> Option<&Path> {
        self.criteria.as_ref().map(|criteria| criteria.output_dir.as_path())
    }

    /// Returns `true` if `filename` exists in the output directory.
    #[must_use]
    pub fn is_stored(&self, filename: &str) -> bool {
        self.output_directory()
            .is_some_and(|dir| dir.join(filename).is_file())
    }

    /// Excludes a filename from copying and records it in the rules text.
    ///
    /// Returns `false` if the rules are not parsed or the filename was
    /// already excluded.
    pub fn add_exclusion(&mut self, filename: &str) -> bool {
        let Some(criteria) = self.criteria.as_mut() else {
            return false;
        };
        if !criteria.exclude(filename) {
            return false;
        }
        self.text = rules::append_exclusion(&self.text, filename);
        debug!(filename, "Excluded email");
        true
    }

    /// Removes a filename from the exclusions and from the rules text.
    ///
    /// Returns `false` if the rules are not parsed or the filename was not
    /// excluded.
    pub fn remove_exclusion(&mut self, filename: &str) -> bool {
        let Some(criteria) = self.criteria.as_mut() else {
            return false;
        };
        if !criteria.include(filename) {
            return false;
        }
        self.text = rules::remove_exclusion(&self.text, filename).0;
        debug!(filename, "Included email");
        true
    }

    /// Classifies the selection against the output directory without
    /// copying anything.
    ///
    /// # Errors
    ///
    /// Returns the selection error, or an I/O error from reading the output
    /// directory.
    pub fn reconcile(&mut self) -> Result<Reconciliation<'_>> {
        self.selection()?;
        let (Some(criteria), Some(selection)) = (&self.criteria, &self.selection) else {
            return Err(not_parsed());
        };
        Reconciliation::classify(
            selection.copy_items(),
            &criteria.output_dir,
            criteria.exclusions(),
        )
    }

    /// Copies the new emails of the selection into the output directory.
    ///
    /// # Errors
    ///
    /// See [`reconcile`](Self::reconcile) and [`Reconciliation::execute`].
    pub fn copy_selection(&mut self) -> Result<CopyReport> {
        self.reconcile()?.execute()
    }

    fn require_criteria(&self) -> Result<&SelectionCriteria> {
        self.criteria.as_ref().ok_or_else(not_parsed)
    }
}

fn not_parsed() -> Error {
    Error::Config("selection rules have not been parsed".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::needless_collect)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ARCHIVE: &str = "\
From MAILER-DAEMON Mon Jan  1 10:00:00 2024
From: a@x.com
Date: Mon, 1 Jan 2024 10:00:00 +0000
Subject: first

one

From MAILER-DAEMON Tue Jan  2 10:00:00 2024
From: b@x.com
Date: Tue, 2 Jan 2024 10:00:00 +0000
Subject: second

two
";

    fn collector(dir: &TempDir, extra: &str) -> EmailCollector {
        fs::write(dir.path().join("inbox.mbox"), ARCHIVE).unwrap();
        let text = format!("mailboxstyle mbox\nmboxmailstore inbox.mbox\ncollected out\n{extra}");
        EmailCollector::new(dir.path(), text)
    }

    #[test]
    fn test_unparsed_collector() {
        let mut collector = EmailCollector::new(".", "mailboxstyle mbox\n");
        assert!(collector.criteria().is_none());
        assert!(matches!(collector.selection(), Err(Error::Config(_))));
        assert!(!collector.add_exclusion("a.mbs"));
        assert!(!collector.parse());
        assert!(collector.criteria().is_none());
        assert!(collector.excluded_filenames().is_empty());
    }

    #[test]
    fn test_selection_and_filename_map() {
        let dir = TempDir::new().unwrap();
        let mut collector = collector(&dir, "");
        assert!(collector.parse());

        let records = collector.selected_candidates().unwrap().to_vec();
        let names: Vec<_> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(
            names,
            vec!["20240101100000a@x.com+00000.mbs", "20240102100000b@x.com+00000.mbs"]
        );
        assert_eq!(records[1].subject, "second");
        assert_eq!(collector.selected_message_bodies().unwrap().len(), 2);
        assert_eq!(
            collector.filename_for(&records[0].locator),
            Some("20240101100000a@x.com+00000.mbs")
        );
        assert!(collector.missing_archives().is_empty());
    }

    #[test]
    fn test_copy_writes_archive_bytes() {
        let dir = TempDir::new().unwrap();
        let mut collector = collector(&dir, "emailsfrom b@x.com\n");
        collector.try_parse().unwrap();

        let report = collector.copy_selection().unwrap();
        assert_eq!(report.written(), Some(1));
        let stored = fs::read_to_string(dir.path().join("out/20240102100000b@x.com+00000.mbs")).unwrap();
        assert_eq!(stored, "From: b@x.com\nDate: Tue, 2 Jan 2024 10:00:00 +0000\nSubject: second\n\ntwo\n");
        assert!(collector.is_stored("20240102100000b@x.com+00000.mbs"));
        assert!(!collector.is_stored("20240101100000a@x.com+00000.mbs"));
    }

    #[test]
    fn test_exclusions_update_text_and_copy() {
        let dir = TempDir::new().unwrap();
        let mut collector = collector(&dir, "");
        collector.try_parse().unwrap();

        assert!(collector.add_exclusion("20240101100000a@x.com+00000.mbs"));
        assert!(!collector.add_exclusion("20240101100000a@x.com+00000.mbs"));
        assert!(collector.text().ends_with("exclude 20240101100000a@x.com+00000.mbs\n"));
        assert_eq!(collector.copy_selection().unwrap().written(), Some(1));

        assert!(collector.remove_exclusion("20240101100000a@x.com+00000.mbs"));
        assert!(!collector.text().contains("exclude"));
        assert!(collector.excluded_filenames().is_empty());

        // An earlier email extends the stored range downwards.
        let report = collector.copy_selection().unwrap();
        assert_eq!(report.written(), Some(1));
    }

    #[test]
    fn test_missing_archive_reported() {
        let dir = TempDir::new().unwrap();
        let mut collector = collector(&dir, "mboxmailstore gone.mbox\n");
        collector.try_parse().unwrap();
        assert_eq!(collector.selected_candidates().unwrap().len(), 2);
        assert_eq!(collector.missing_archives(), &[dir.path().join("gone.mbox")]);
    }
}
