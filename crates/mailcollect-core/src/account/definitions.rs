//! `accounts.ini` parsing.
//!
//! The definitions file has a number of sections. The parts that matter here:
//!
//! ```text
//! [Account4]
//! ...
//! Email=owner@example.com
//! ...
//! [Account5]
//! ```
//!
//! Every `[AccountN]` header must be followed by exactly one `Email=` line
//! before the next section header. Anything else means the file cannot be
//! trusted to map directories to owners, so the whole file is rejected.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Mapping from lower-cased account directory name to owner address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountMap {
    accounts: BTreeMap<String, String>,
}

/// One line of the definitions file, as far as account mapping cares.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    /// `[Account<digits>]`
    Account(&'a str),
    /// Any other `[section]`.
    Section,
    /// `Email=<address>`
    Email(&'a [u8]),
    /// Everything else.
    Other,
}

impl<'a> Line<'a> {
    fn classify(line: &'a [u8]) -> Self {
        if let Some(inner) = line.strip_prefix(b"[").and_then(|l| l.strip_suffix(b"]")) {
            let is_account = inner
                .strip_prefix(b"Account")
                .is_some_and(|n| !n.is_empty() && n.iter().all(u8::is_ascii_digit));
            return match std::str::from_utf8(inner) {
                Ok(name) if is_account => Self::Account(name),
                _ => Self::Section,
            };
        }
        match line.strip_prefix(b"Email=") {
            Some(address) if !address.is_empty() => Self::Email(address),
            _ => Self::Other,
        }
    }
}

impl AccountMap {
    /// Reads and parses a definitions file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or violates the section
    /// structure described in the module documentation.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::AccountDefinitions {
            path: path.to_path_buf(),
            line: 0,
            reason: e.to_string(),
        })?;
        let map = Self::parse(&bytes, path)?;
        debug!(path = %path.display(), accounts = map.len(), "Loaded account definitions");
        Ok(map)
    }

    /// Parses the contents of a definitions file.
    ///
    /// `path` is only used in error reports.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountDefinitions`] on any structural violation: an
    /// account header while the previous account still lacks its `Email=`
    /// line, any other section header in that state, an `Email=` line outside
    /// an account section, a repeated account, or an account left without an
    /// address at end of file.
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        let fail = |line: usize, reason: String| Error::AccountDefinitions {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut accounts = BTreeMap::new();
        let mut pending: Option<(String, usize)> = None;
        let mut line_count = 0;

        for (index, raw) in bytes.split(|&b| b == b'\n').enumerate() {
            let number = index + 1;
            line_count = number;
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

            match Line::classify(raw) {
                Line::Account(name) => {
                    if let Some((open, _)) = &pending {
                        return Err(fail(number, format!("[{open}] has no Email line before [{name}]")));
                    }
                    // Headers are title case, store directories lower case.
                    let key = name.to_lowercase();
                    if accounts.contains_key(&key) {
                        return Err(fail(number, format!("[{name}] is defined twice")));
                    }
                    pending = Some((name.to_string(), number));
                }
                Line::Section => {
                    if let Some((open, _)) = &pending {
                        return Err(fail(number, format!("[{open}] has no Email line before the next section")));
                    }
                }
                Line::Email(address) => {
                    let Some((name, _)) = pending.take() else {
                        return Err(fail(number, "Email line outside an account section".to_string()));
                    };
                    let address = String::from_utf8(address.to_vec())
                        .map_err(|_| fail(number, "Email address is not UTF-8".to_string()))?;
                    accounts.insert(name.to_lowercase(), address.trim().to_string());
                }
                Line::Other => {}
            }
        }

        if let Some((open, opened_at)) = pending {
            return Err(fail(
                line_count,
                format!("[{open}] opened on line {opened_at} has no Email line"),
            ));
        }

        Ok(Self { accounts })
    }

    /// Returns the owner address of an account directory.
    #[must_use]
    pub fn owner(&self, account: &str) -> Option<&str> {
        self.accounts.get(account).map(String::as_str)
    }

    /// Returns `true` if the account directory is defined.
    #[must_use]
    pub fn contains(&self, account: &str) -> bool {
        self.accounts.contains_key(account)
    }

    /// Number of defined accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no accounts are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterates `(account, owner)` pairs in account name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.accounts.iter().map(|(k, v)| (k.as_str(), v.as_str()))
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

    fn parse(text: &str) -> Result<AccountMap> {
        AccountMap::parse(text.as_bytes(), Path::new("accounts.ini"))
    }

    #[test]
    fn test_parse_accounts() {
        let map = parse(concat!(
            "[Settings]\n",
            "Count=2\n",
            "[Account1]\n",
            "Incoming=imap\n",
            "Email=one@example.com\n",
            "Name=One\n",
            "[Account4]\r\n",
            "Email=four@example.com\r\n",
        ))
        .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.owner("account1"), Some("one@example.com"));
        assert_eq!(map.owner("account4"), Some("four@example.com"));
        assert_eq!(map.owner("Account4"), None);
        assert!(!map.contains("account2"));
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_account_without_email_before_next_account() {
        let err = parse("[Account1]\n[Account2]\nEmail=two@example.com\n").unwrap_err();
        assert!(matches!(err, Error::AccountDefinitions { line: 2, .. }));
    }

    #[test]
    fn test_account_without_email_before_other_section() {
        let err = parse("[Account1]\n[Settings]\nEmail=x@example.com\n").unwrap_err();
        assert!(matches!(err, Error::AccountDefinitions { line: 2, .. }));
    }

    #[test]
    fn test_email_outside_account_section() {
        let err = parse("[Settings]\nEmail=x@example.com\n").unwrap_err();
        assert!(matches!(err, Error::AccountDefinitions { line: 2, .. }));
    }

    #[test]
    fn test_second_email_line_is_outside_section() {
        let err = parse("[Account1]\nEmail=a@x.com\nEmail=b@x.com\n").unwrap_err();
        assert!(matches!(err, Error::AccountDefinitions { line: 3, .. }));
    }

    #[test]
    fn test_unterminated_account_section() {
        let err = parse("[Account1]\nName=One\n").unwrap_err();
        assert!(matches!(err, Error::AccountDefinitions { .. }));
    }

    #[test]
    fn test_duplicate_account() {
        let err = parse("[Account1]\nEmail=a@x.com\n[Account1]\nEmail=b@x.com\n").unwrap_err();
        assert!(matches!(err, Error::AccountDefinitions { line: 3, .. }));
    }

    #[test]
    fn test_line_classify() {
        assert_eq!(Line::classify(b"[Account12]"), Line::Account("Account12"));
        assert_eq!(Line::classify(b"[Account]"), Line::Section);
        assert_eq!(Line::classify(b"[account3]"), Line::Section);
        assert_eq!(Line::classify(b"Email="), Line::Other);
        assert_eq!(Line::classify(b"Email=a@x.com"), Line::Email(b"a@x.com"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AccountMap::load(Path::new("/nonexistent/accounts.ini")).unwrap_err();
        assert!(matches!(err, Error::AccountDefinitions { line: 0, .. }));
    }
}
