//! Sender filtering.
//!
//! Addresses are compared without regard to ASCII case.

use std::collections::BTreeSet;
use std::fs;

use mailcollect_mime::{Message, parse_address};
use tracing::debug;

use crate::account::AccountMap;
use crate::error::{Error, Result};
use crate::filename::DeriveFilename;
use crate::record::{EmailRecord, SelectedEmail};
use crate::scan::{ArchivedMessage, StoredFile};

/// Which senders are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SenderPolicy {
    /// Every sender, including the account owner.
    #[default]
    Any,
    /// Everyone except the owner of the account the email was filed under.
    ExceptOwner,
    /// Only the listed senders, and never the account owner.
    Only(BTreeSet<String>),
}

impl SenderPolicy {
    /// Builds the policy for an optional allow-list.
    ///
    /// `None` accepts everyone. An empty list accepts everyone but the
    /// account owner.
    #[must_use]
    pub fn from_senders(senders: Option<&BTreeSet<String>>) -> Self {
        match senders {
            None => Self::Any,
            Some(senders) if senders.is_empty() => Self::ExceptOwner,
            Some(senders) => Self::Only(senders.iter().map(|s| s.to_ascii_lowercase()).collect()),
        }
    }

    /// Returns `true` if an email from `from` filed under `owner` is accepted.
    #[must_use]
    pub fn accepts(&self, from: &str, owner: Option<&str>) -> bool {
        let is_owner = || owner.is_some_and(|owner| owner.eq_ignore_ascii_case(from));
        match self {
            Self::Any => true,
            Self::ExceptOwner => !is_owner(),
            Self::Only(senders) => !is_owner() && senders.contains(&from.to_ascii_lowercase()),
        }
    }
}

/// Applies a [`SenderPolicy`] to scanned candidates.
#[derive(Debug, Clone, Default)]
pub struct SenderFilter {
    policy: SenderPolicy,
}

impl SenderFilter {
    /// Creates a filter.
    #[must_use]
    pub const fn new(policy: SenderPolicy) -> Self {
        Self { policy }
    }

    /// The policy applied.
    #[must_use]
    pub const fn policy(&self) -> &SenderPolicy {
        &self.policy
    }

    /// Reads directory store files and keeps the accepted ones.
    ///
    /// Files whose `From` or `Date` header does not allow a filename to be
    /// derived are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scan`] if a file cannot be read, with the number of
    /// emails accepted so far.
    pub fn filter_stored(
        &self,
        files: Vec<StoredFile>,
        accounts: &AccountMap,
    ) -> Result<Vec<SelectedEmail>> {
        let mut selected = Vec::new();
        let mut last = None;
        let mut dropped = 0usize;

        for file in files {
            let bytes = fs::read(&file.path).map_err(|source| Error::Scan {
                collected: selected.len(),
                last: last.clone(),
                source,
            })?;
            let message = Message::parse(bytes);

            let Some(filename) = message.derive_filename() else {
                dropped += 1;
                continue;
            };
            let Some(record) = EmailRecord::from_message(&message, filename, file.locator()) else {
                dropped += 1;
                continue;
            };
            if self.policy.accepts(&record.from_address, accounts.owner(&file.account)) {
                last = Some(file.path);
                selected.push(SelectedEmail { record, message });
            }
        }

        if dropped > 0 {
            debug!(dropped, "Dropped stored emails without usable From or Date");
        }
        Ok(selected)
    }

    /// Keeps the accepted archive messages.
    ///
    /// Archives have no account owner, so only an allow-list excludes
    /// anything.
    #[must_use]
    pub fn filter_archived(&self, messages: Vec<ArchivedMessage>) -> Vec<ArchivedMessage> {
        messages
            .into_iter()
            .filter(|m| {
                m.message
                    .from()
                    .and_then(parse_address)
                    .is_some_and(|from| self.policy.accepts(&from, None))
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::needless_collect)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use chrono::NaiveDate;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn senders(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_policy_from_senders() {
        assert_eq!(SenderPolicy::from_senders(None), SenderPolicy::Any);
        assert_eq!(
            SenderPolicy::from_senders(Some(&BTreeSet::new())),
            SenderPolicy::ExceptOwner
        );
        assert_eq!(
            SenderPolicy::from_senders(Some(&senders(&["Mum@X.com"]))),
            SenderPolicy::Only(senders(&["mum@x.com"]))
        );
    }

    #[test]
    fn test_policy_accepts() {
        let any = SenderPolicy::Any;
        assert!(any.accepts("me@x.com", Some("me@x.com")));

        let except = SenderPolicy::ExceptOwner;
        assert!(!except.accepts("ME@x.com", Some("me@x.com")));
        assert!(except.accepts("mum@x.com", Some("me@x.com")));
        assert!(except.accepts("me@x.com", None));

        let only = SenderPolicy::from_senders(Some(&senders(&["mum@x.com", "me@x.com"])));
        assert!(only.accepts("MUM@x.com", Some("me@x.com")));
        assert!(!only.accepts("me@x.com", Some("me@x.com")));
        assert!(!only.accepts("dad@x.com", Some("me@x.com")));
    }

    fn stored(dir: &TempDir, account: &str, name: &str, content: &str) -> StoredFile {
        let path = dir.path().join(account).join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        StoredFile {
            account: account.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            name: name.to_string(),
            path,
        }
    }

    #[test]
    fn test_filter_stored() {
        let dir = TempDir::new().unwrap();
        let accounts =
            AccountMap::parse(b"[Account1]\nEmail=me@x.com\n", Path::new("accounts.ini")).unwrap();
        let files = vec![
            stored(&dir, "account1", "1", "From: mum@x.com\nDate: Mon, 1 Jan 2024 10:00:00 +0000\n\nhi\n"),
            stored(&dir, "account1", "2", "From: me@x.com\nDate: Mon, 1 Jan 2024 11:00:00 +0000\n\nsent\n"),
            stored(&dir, "account1", "3", "From: dad@x.com\n\nundated\n"),
        ];

        let filter = SenderFilter::new(SenderPolicy::ExceptOwner);
        let selected = filter.filter_stored(files.clone(), &accounts).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record.filename, "20240101100000mum@x.com+00000.mbs");
        assert_eq!(selected[0].record.locator, files[0].locator());

        let selected = SenderFilter::default().filter_stored(files, &accounts).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_filter_stored_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let accounts = AccountMap::default();
        let mut file = stored(&dir, "account1", "1", "From: a@x.com\n\n");
        file.path = dir.path().join("vanished");

        let err = SenderFilter::default().filter_stored(vec![file], &accounts).unwrap_err();
        assert!(matches!(err, Error::Scan { collected: 0, .. }));
    }

    fn archived(from: &str, n: usize) -> ArchivedMessage {
        let raw = format!("From: {from}\nDate: Mon, 1 Jan 2024 10:00:00 +0000\n\n{n}\n");
        let message = Message::parse(raw.into_bytes());
        let key = message.derive_filename().unwrap_or_default();
        ArchivedMessage {
            filename: key.clone(),
            key,
            message_id: None,
            archive: PathBuf::from("a.mbox"),
            message,
        }
    }

    proptest! {
        #[test]
        fn prop_filter_is_idempotent(
            froms in prop::collection::vec("(a|b|c|d)@x\\.com", 0..12),
            allowed in prop::collection::btree_set("(a|b|e)@x\\.com", 0..3),
            listed in any::<bool>(),
        ) {
            let policy = SenderPolicy::from_senders(listed.then_some(&allowed));
            let filter = SenderFilter::new(policy);
            let messages: Vec<_> = froms.iter().enumerate().map(|(n, f)| archived(f, n)).collect();

            let once = filter.filter_archived(messages);
            let once_raw: Vec<_> = once.iter().map(|m| m.message.raw().to_vec()).collect();
            let twice = filter.filter_archived(once);
            let twice_raw: Vec<_> = twice.iter().map(|m| m.message.raw().to_vec()).collect();
            prop_assert_eq!(once_raw, twice_raw);
        }

        #[test]
        fn prop_filter_stored_is_idempotent(
            emails in prop::collection::vec(("(a|b|c)@x\\.com", any::<bool>()), 0..8),
            allowed in prop::collection::btree_set("(a|b|e)@x\\.com", 0..3),
            listed in any::<bool>(),
        ) {
            let dir = TempDir::new().unwrap();
            let accounts =
                AccountMap::parse(b"[Account1]\nEmail=a@x.com\n", Path::new("accounts.ini")).unwrap();
            let files: Vec<_> = emails
                .iter()
                .enumerate()
                .map(|(n, (from, dated))| {
                    let date = if *dated { "Date: Mon, 1 Jan 2024 10:00:00 +0000\n" } else { "" };
                    let content = format!("From: {from}\n{date}\n{n}\n");
                    stored(&dir, "account1", &(n + 1).to_string(), &content)
                })
                .collect();
            let filter = SenderFilter::new(SenderPolicy::from_senders(listed.then_some(&allowed)));

            let once = filter.filter_stored(files.clone(), &accounts).unwrap();
            let kept: Vec<_> = files
                .into_iter()
                .filter(|file| once.iter().any(|email| email.record.locator == file.locator()))
                .collect();
            let twice = filter.filter_stored(kept, &accounts).unwrap();

            let once_names: Vec<_> = once.iter().map(|email| &email.record.filename).collect();
            let twice_names: Vec<_> = twice.iter().map(|email| &email.record.filename).collect();
            prop_assert_eq!(once_names, twice_names);
        }
    }
}
