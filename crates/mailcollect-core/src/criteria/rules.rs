//! Selection rules document.
//!
//! ```text
//! # Collect last year's mail from the family
//! mailboxstyle        opera
//! operamailstore      ~/.opera/mail/store
//! operaaccountdefs    ~/.opera/mail/accounts.ini
//! earliestfromdate    2023-01-01
//! mostrecentfromdate  2023-12-31
//! account             me@example.com
//! emailsfrom          mum@example.com
//! emailsfrom          dad@example.com
//! collected           family
//! exclude             20230312101500dad@example.com+00000.mbs
//! ```
//!
//! Keys are case-insensitive. Blank lines and `#` comments are ignored, and a
//! `#` after a value starts a comment. Any other line shape, a key without a
//! value, or an unknown key rejects the whole document.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Default file name of a selection rules document.
pub const COLLECTED_CONF: &str = "collected.conf";

/// Keys of the selection rules grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// `mailboxstyle`
    MailboxStyle,
    /// `operamailstore`
    OperaMailStore,
    /// `mboxmailstore`
    MboxMailStore,
    /// `operaaccountdefs`
    OperaAccountDefs,
    /// `earliestfromdate`
    EarliestFromDate,
    /// `mostrecentfromdate`
    MostRecentFromDate,
    /// `account`
    Account,
    /// `emailsfrom`
    EmailsFrom,
    /// `collected`
    Collected,
    /// `exclude`
    Exclude,
}

impl Key {
    /// Parses a key, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mailboxstyle" => Some(Self::MailboxStyle),
            "operamailstore" => Some(Self::OperaMailStore),
            "mboxmailstore" => Some(Self::MboxMailStore),
            "operaaccountdefs" => Some(Self::OperaAccountDefs),
            "earliestfromdate" => Some(Self::EarliestFromDate),
            "mostrecentfromdate" => Some(Self::MostRecentFromDate),
            "account" => Some(Self::Account),
            "emailsfrom" => Some(Self::EmailsFrom),
            "collected" => Some(Self::Collected),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }

    /// Canonical spelling of the key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MailboxStyle => "mailboxstyle",
            Self::OperaMailStore => "operamailstore",
            Self::MboxMailStore => "mboxmailstore",
            Self::OperaAccountDefs => "operaaccountdefs",
            Self::EarliestFromDate => "earliestfromdate",
            Self::MostRecentFromDate => "mostrecentfromdate",
            Self::Account => "account",
            Self::EmailsFrom => "emailsfrom",
            Self::Collected => "collected",
            Self::Exclude => "exclude",
        }
    }
}

/// A classified line of a rules document.
#[derive(Debug, PartialEq, Eq)]
enum RuleLine<'a> {
    Blank,
    Entry { key: &'a str, value: &'a str },
}

/// Classifies one line.
///
/// `Err` carries the reason the line is not blank, a comment or `key value`.
fn classify(line: &str) -> std::result::Result<RuleLine<'_>, &'static str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(RuleLine::Blank);
    }

    let Some(split) = trimmed.find(char::is_whitespace) else {
        return Err("key has no value");
    };
    let (key, rest) = trimmed.split_at(split);
    let value = rest.split('#').next().unwrap_or_default().trim();
    if value.is_empty() {
        return Err("key has no value");
    }

    Ok(RuleLine::Entry { key, value })
}

/// A parsed selection rules document, values as written.
///
/// Single-valued keys keep the last value given. An empty `accounts` or
/// `emails_from` set cannot come from text, since every line needs a value,
/// but is meaningful when built in code: see
/// [`SelectionCriteria::senders`](crate::SelectionCriteria::senders).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRules {
    /// `mailboxstyle`
    pub mailbox_style: Option<String>,
    /// `operamailstore`
    pub opera_mail_store: Option<String>,
    /// `mboxmailstore`, repeatable.
    pub mbox_mail_stores: BTreeSet<String>,
    /// `operaaccountdefs`
    pub opera_account_defs: Option<String>,
    /// `earliestfromdate`
    pub earliest_from_date: Option<String>,
    /// `mostrecentfromdate`
    pub most_recent_from_date: Option<String>,
    /// `account`, repeatable.
    pub accounts: Option<BTreeSet<String>>,
    /// `emailsfrom`, repeatable.
    pub emails_from: Option<BTreeSet<String>>,
    /// `collected`
    pub collected: Option<String>,
    /// `exclude`, repeatable.
    pub exclude: BTreeSet<String>,
}

impl SelectionRules {
    /// Parses a rules document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rules`] for the first line that is not blank, a
    /// comment or a `key value` pair with a known key. Nothing of a rejected
    /// document is kept.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rules = Self::default();

        for (index, line) in text.lines().enumerate() {
            let fail = |reason: String| Error::Rules {
                line: index + 1,
                reason,
            };

            let (key, value) = match classify(line).map_err(|reason| fail(reason.to_string()))? {
                RuleLine::Blank => continue,
                RuleLine::Entry { key, value } => (key, value),
            };
            let key = Key::parse(key).ok_or_else(|| fail(format!("unknown key {key:?}")))?;
            rules.set(key, value.to_string());
        }

        Ok(rules)
    }

    fn set(&mut self, key: Key, value: String) {
        match key {
            Key::MailboxStyle => self.mailbox_style = Some(value),
            Key::OperaMailStore => self.opera_mail_store = Some(value),
            Key::MboxMailStore => {
                self.mbox_mail_stores.insert(value);
            }
            Key::OperaAccountDefs => self.opera_account_defs = Some(value),
            Key::EarliestFromDate => self.earliest_from_date = Some(value),
            Key::MostRecentFromDate => self.most_recent_from_date = Some(value),
            Key::Account => {
                self.accounts.get_or_insert_with(BTreeSet::new).insert(value);
            }
            Key::EmailsFrom => {
                self.emails_from.get_or_insert_with(BTreeSet::new).insert(value);
            }
            Key::Collected => self.collected = Some(value),
            Key::Exclude => {
                self.exclude.insert(value);
            }
        }
    }
}

/// Appends an `exclude <filename>` line to a rules document.
#[must_use]
pub fn append_exclusion(text: &str, filename: &str) -> String {
    let mut out = String::with_capacity(text.len() + filename.len() + 10);
    out.push_str(text);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(Key::Exclude.as_str());
    out.push(' ');
    out.push_str(filename);
    out.push('\n');
    out
}

/// Removes every `exclude <filename>` line naming `filename`.
///
/// Other lines are kept exactly as written. Returns the new text and the
/// number of lines removed.
#[must_use]
pub fn remove_exclusion(text: &str, filename: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut removed = 0;

    for line in text.split_inclusive('\n') {
        let names_file = matches!(
            classify(line.trim_end_matches(['\r', '\n'])),
            Ok(RuleLine::Entry { key, value })
                if Key::parse(key) == Some(Key::Exclude) && value == filename
        );
        if names_file {
            removed += 1;
        } else {
            out.push_str(line);
        }
    }

    (out, removed)
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

    const RULES: &str = "\
# family mail
mailboxstyle   Opera
operamailstore ~/store   # trailing comment

EarliestFromDate 2023-01-01
account me@example.com
emailsfrom mum@example.com
emailsfrom dad@example.com
collected family
exclude 20230312101500dad@example.com+00000.mbs
";

    #[test]
    fn test_parse_rules() {
        let rules = SelectionRules::parse(RULES).unwrap();
        assert_eq!(rules.mailbox_style.as_deref(), Some("Opera"));
        assert_eq!(rules.opera_mail_store.as_deref(), Some("~/store"));
        assert_eq!(rules.earliest_from_date.as_deref(), Some("2023-01-01"));
        assert_eq!(rules.most_recent_from_date, None);
        assert_eq!(rules.accounts.unwrap().len(), 1);
        assert_eq!(rules.emails_from.unwrap().len(), 2);
        assert_eq!(rules.collected.as_deref(), Some("family"));
        assert!(rules.exclude.contains("20230312101500dad@example.com+00000.mbs"));
    }

    #[test]
    fn test_parse_empty_document() {
        let rules = SelectionRules::parse("\n  \n# nothing\n").unwrap();
        assert_eq!(rules, SelectionRules::default());
    }

    #[test]
    fn test_last_single_value_wins() {
        let rules = SelectionRules::parse("collected one\ncollected two\n").unwrap();
        assert_eq!(rules.collected.as_deref(), Some("two"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = SelectionRules::parse("mailboxstyle mbox\nfolder inbox\n").unwrap_err();
        assert!(matches!(err, Error::Rules { line: 2, .. }));
    }

    #[test]
    fn test_key_without_value_rejected() {
        assert!(matches!(
            SelectionRules::parse("collected\n"),
            Err(Error::Rules { line: 1, .. })
        ));
        assert!(matches!(
            SelectionRules::parse("collected   # none\n"),
            Err(Error::Rules { line: 1, .. })
        ));
    }

    #[test]
    fn test_key_parse_round_trip() {
        for key in [Key::MailboxStyle, Key::MboxMailStore, Key::Exclude, Key::EmailsFrom] {
            assert_eq!(Key::parse(key.as_str()), Some(key));
        }
        assert_eq!(Key::parse("MBOXMAILSTORE"), Some(Key::MboxMailStore));
    }

    #[test]
    fn test_append_exclusion() {
        let text = append_exclusion("collected out", "a.mbs");
        assert_eq!(text, "collected out\nexclude a.mbs\n");
        let rules = SelectionRules::parse(&text).unwrap();
        assert!(rules.exclude.contains("a.mbs"));
        assert_eq!(append_exclusion("", "a.mbs"), "exclude a.mbs\n");
    }

    #[test]
    fn test_remove_exclusion() {
        let text = "collected out\r\nexclude a.mbs\r\n# exclude a.mbs\nEXCLUDE  a.mbs # again\nexclude b.mbs\n";
        let (text, removed) = remove_exclusion(text, "a.mbs");
        assert_eq!(removed, 2);
        assert_eq!(text, "collected out\r\n# exclude a.mbs\nexclude b.mbs\n");
    }
}
