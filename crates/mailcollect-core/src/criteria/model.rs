//! Validated selection criteria.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::warn;

use super::dates::parse_date_bound;
use super::rules::SelectionRules;
use crate::error::{Error, Result};
use crate::scan::DateBounds;

/// Output directory used when the rules do not name one.
pub const DEFAULT_COLLECTED: &str = "collected";

/// Layout of the mail store being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxStyle {
    /// Opera directory store: one file per message under
    /// `account/year/month/day/`.
    Opera,
    /// One or more mbox archive files.
    Mbox,
}

impl MailboxStyle {
    /// Parses a `mailboxstyle` value, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedStyle`] for anything but `opera` or `mbox`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "opera" => Ok(Self::Opera),
            "mbox" => Ok(Self::Mbox),
            other => Err(Error::UnsupportedStyle(other.to_string())),
        }
    }

    /// Rules-file spelling of the style.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Opera => "opera",
            Self::Mbox => "mbox",
        }
    }
}

impl fmt::Display for MailboxStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the emails are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailStore {
    /// Opera directory store.
    Opera {
        /// Root of the `account/year/month/day` tree.
        store: PathBuf,
        /// The client's `accounts.ini`.
        account_defs: PathBuf,
        /// Owner addresses of the accounts to read; `None` reads every account.
        accounts: Option<BTreeSet<String>>,
    },
    /// Mbox archives.
    Mbox {
        /// Archive files, read in path order.
        archives: BTreeSet<PathBuf>,
    },
}

impl MailStore {
    /// Style of this store.
    #[must_use]
    pub const fn style(&self) -> MailboxStyle {
        match self {
            Self::Opera { .. } => MailboxStyle::Opera,
            Self::Mbox { .. } => MailboxStyle::Mbox,
        }
    }
}

/// Validated selection criteria.
///
/// Built once from a rules document. Only the exclusion set changes
/// afterwards, as a user includes or excludes individual emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCriteria {
    /// Store to read.
    pub store: MailStore,
    /// Earliest send date to select, inclusive.
    pub earliest: Option<NaiveDate>,
    /// Most recent send date to select, inclusive.
    pub most_recent: Option<NaiveDate>,
    /// Sender allow-list.
    ///
    /// `None` accepts every sender. An empty set accepts anyone except the
    /// account owner; a non-empty set additionally requires the sender to be
    /// listed.
    pub senders: Option<BTreeSet<String>>,
    /// Directory the selected emails are copied into.
    pub output_dir: PathBuf,
    exclude: BTreeSet<String>,
}

impl SelectionCriteria {
    /// Creates criteria with no date bounds, sender filter or exclusions.
    #[must_use]
    pub const fn new(store: MailStore, output_dir: PathBuf) -> Self {
        Self {
            store,
            earliest: None,
            most_recent: None,
            senders: None,
            output_dir,
            exclude: BTreeSet::new(),
        }
    }

    /// Validates a rules document.
    ///
    /// Relative paths are resolved against `directory`, the directory holding
    /// the rules document. `~` and `$VAR` are expanded first.
    ///
    /// # Errors
    ///
    /// Returns an error if the style is missing or unknown, a date bound does
    /// not parse, a path cannot be expanded, no archive is named for the mbox
    /// style, or a key belongs to the other style.
    pub fn from_rules(rules: &SelectionRules, directory: &Path) -> Result<Self> {
        let style = rules
            .mailbox_style
            .as_deref()
            .ok_or_else(|| Error::Config("mailboxstyle is required".to_string()))
            .and_then(MailboxStyle::parse)?;

        let store = match style {
            MailboxStyle::Opera => {
                if !rules.mbox_mail_stores.is_empty() {
                    return Err(Error::Config("mboxmailstore is not used by the opera style".to_string()));
                }
                MailStore::Opera {
                    store: resolve_or_default(rules.opera_mail_store.as_deref(), directory, "store")?,
                    account_defs: resolve_or_default(
                        rules.opera_account_defs.as_deref(),
                        directory,
                        "accounts.ini",
                    )?,
                    accounts: rules.accounts.clone(),
                }
            }
            MailboxStyle::Mbox => {
                for (present, key) in [
                    (rules.opera_mail_store.is_some(), "operamailstore"),
                    (rules.opera_account_defs.is_some(), "operaaccountdefs"),
                    (rules.accounts.is_some(), "account"),
                ] {
                    if present {
                        return Err(Error::Config(format!("{key} is not used by the mbox style")));
                    }
                }
                if rules.mbox_mail_stores.is_empty() {
                    return Err(Error::Config("mboxmailstore is required for the mbox style".to_string()));
                }
                let archives = rules
                    .mbox_mail_stores
                    .iter()
                    .map(|archive| resolve(archive, directory))
                    .collect::<Result<_>>()?;
                MailStore::Mbox { archives }
            }
        };

        let earliest = rules
            .earliest_from_date
            .as_deref()
            .map(|value| parse_date_bound("earliest", value))
            .transpose()?;
        let most_recent = rules
            .most_recent_from_date
            .as_deref()
            .map(|value| parse_date_bound("most recent", value))
            .transpose()?;

        let collected = rules.collected.as_deref().unwrap_or_else(|| {
            warn!("Directory for collected emails not specified, using {DEFAULT_COLLECTED:?}");
            DEFAULT_COLLECTED
        });

        Ok(Self {
            store,
            earliest,
            most_recent,
            senders: rules.emails_from.clone(),
            output_dir: resolve(collected, directory)?,
            exclude: rules.exclude.clone(),
        })
    }

    /// Style of the configured store.
    #[must_use]
    pub const fn style(&self) -> MailboxStyle {
        self.store.style()
    }

    /// Date bounds for the scanners.
    #[must_use]
    pub const fn date_bounds(&self) -> DateBounds {
        DateBounds::new(self.earliest, self.most_recent)
    }

    /// Filenames excluded from copying.
    #[must_use]
    pub const fn exclusions(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    /// Adds a filename to the exclusion set. Returns `false` if already there.
    pub fn exclude(&mut self, filename: impl Into<String>) -> bool {
        self.exclude.insert(filename.into())
    }

    /// Removes a filename from the exclusion set. Returns `false` if absent.
    pub fn include(&mut self, filename: &str) -> bool {
        self.exclude.remove(filename)
    }
}

/// Expands `~` and `$VAR` and resolves a relative result against `directory`.
fn resolve(value: &str, directory: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(value)
        .map_err(|e| Error::Config(format!("cannot expand path {value:?}: {e}")))?;
    Ok(directory.join(expanded.as_ref()))
}

/// Resolves a configured Opera path, defaulting to `~/.opera/mail/<name>`.
fn resolve_or_default(value: Option<&str>, directory: &Path, name: &str) -> Result<PathBuf> {
    match value {
        Some(value) => resolve(value, directory),
        None => dirs::home_dir()
            .map(|home| home.join(".opera").join("mail").join(name))
            .ok_or_else(|| Error::Config(format!("no home directory for the default Opera {name}"))),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn criteria(text: &str) -> Result<SelectionCriteria> {
        SelectionCriteria::from_rules(&SelectionRules::parse(text).unwrap(), Path::new("/rules"))
    }

    #[test]
    fn test_opera_criteria() {
        let criteria = criteria(
            "mailboxstyle OPERA\noperamailstore store\noperaaccountdefs /abs/accounts.ini\n\
             account me@x.com\nearliestfromdate 1 Jan 2023\ncollected out\nexclude a.mbs\n",
        )
        .unwrap();

        assert_eq!(criteria.style(), MailboxStyle::Opera);
        let MailStore::Opera { store, account_defs, accounts } = &criteria.store else {
            panic!("expected opera store");
        };
        assert_eq!(store, Path::new("/rules/store"));
        assert_eq!(account_defs, Path::new("/abs/accounts.ini"));
        assert!(accounts.as_ref().unwrap().contains("me@x.com"));
        assert_eq!(criteria.earliest, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(criteria.most_recent, None);
        assert_eq!(criteria.senders, None);
        assert_eq!(criteria.output_dir, Path::new("/rules/out"));
        assert!(criteria.exclusions().contains("a.mbs"));
    }

    #[test]
    fn test_mbox_criteria() {
        let criteria = criteria(
            "mailboxstyle mbox\nmboxmailstore b.mbox\nmboxmailstore /x/a.mbox\nemailsfrom a@x.com\n",
        )
        .unwrap();

        let MailStore::Mbox { archives } = &criteria.store else {
            panic!("expected mbox store");
        };
        let archives: Vec<_> = archives.iter().cloned().collect();
        assert_eq!(archives, vec![PathBuf::from("/rules/b.mbox"), PathBuf::from("/x/a.mbox")]);
        assert_eq!(criteria.output_dir, Path::new("/rules").join(DEFAULT_COLLECTED));
        assert_eq!(criteria.senders.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_style_required_and_known() {
        assert!(matches!(criteria("collected out\n"), Err(Error::Config(_))));
        assert!(matches!(
            criteria("mailboxstyle maildir\n"),
            Err(Error::UnsupportedStyle(_))
        ));
    }

    #[test]
    fn test_mbox_requires_archives() {
        assert!(matches!(criteria("mailboxstyle mbox\n"), Err(Error::Config(_))));
    }

    #[test]
    fn test_keys_of_other_style_rejected() {
        assert!(matches!(
            criteria("mailboxstyle mbox\nmboxmailstore a\naccount me@x.com\n"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            criteria("mailboxstyle opera\noperamailstore s\noperaaccountdefs d\nmboxmailstore a\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(matches!(
            criteria("mailboxstyle mbox\nmboxmailstore a\nmostrecentfromdate 2023-02-30\n"),
            Err(Error::InvalidDate { field: "most recent", .. })
        ));
    }

    #[test]
    fn test_exclusion_mutation() {
        let mut criteria = SelectionCriteria::new(
            MailStore::Mbox { archives: BTreeSet::new() },
            PathBuf::from("out"),
        );
        assert!(criteria.exclude("a.mbs"));
        assert!(!criteria.exclude("a.mbs"));
        assert!(criteria.include("a.mbs"));
        assert!(!criteria.include("a.mbs"));
        assert!(criteria.exclusions().is_empty());
    }
}
