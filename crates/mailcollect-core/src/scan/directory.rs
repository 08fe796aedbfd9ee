//! Opera directory store scanning.
//!
//! The store holds one directory per account, each laid out as
//! `year/month/day/<message file>` with four, two and two digit names. Days
//! are walked newest first so the walk can stop as soon as it passes the
//! earliest selected date.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{DateBounds, Locator};
use crate::account::AccountMap;
use crate::error::{Error, Result};

/// A message file found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Account directory name.
    pub account: String,
    /// Date of the day directory holding the file.
    pub date: NaiveDate,
    /// File name within the day directory.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
}

impl StoredFile {
    /// Where to read this file from.
    #[must_use]
    pub fn locator(&self) -> Locator {
        Locator::File(self.path.clone())
    }

    /// Ordering key: shorter names first, then by name, then by path.
    ///
    /// Opera numbers its message files, so this orders `7` before `9`
    /// before `10`.
    fn sort_key(&self) -> (usize, &str, &Path) {
        (self.name.len(), &self.name, &self.path)
    }
}

/// Enumerates message files in an Opera directory store.
#[derive(Debug)]
pub struct DirectoryScanner<'a> {
    store: &'a Path,
    accounts: &'a AccountMap,
    owners: Option<&'a BTreeSet<String>>,
    bounds: DateBounds,
}

impl<'a> DirectoryScanner<'a> {
    /// Creates a scanner over `store`.
    ///
    /// Only directories named in `accounts` are read. With `owners`, only
    /// accounts whose owner address is in the set, ignoring ASCII case, are
    /// read.
    #[must_use]
    pub const fn new(
        store: &'a Path,
        accounts: &'a AccountMap,
        owners: Option<&'a BTreeSet<String>>,
        bounds: DateBounds,
    ) -> Self {
        Self {
            store,
            accounts,
            owners,
            bounds,
        }
    }

    /// Lists every message file within the date bounds.
    ///
    /// Open bounds are resolved per account: the most recent end defaults to
    /// the account's latest day directory and the earliest end to one year
    /// before that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scan`] on any filesystem error, including a missing
    /// store, with the number of files found so far and the last of them.
    pub fn scan(&self) -> Result<Vec<StoredFile>> {
        let mut found = Vec::new();
        if let Err(source) = self.collect(&mut found) {
            return Err(Error::Scan {
                collected: found.len(),
                last: found.last().map(|file| file.path.clone()),
                source,
            });
        }

        found.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        debug!(store = %self.store.display(), files = found.len(), "Scanned directory store");
        Ok(found)
    }

    fn collect(&self, found: &mut Vec<StoredFile>) -> io::Result<()> {
        let mut accounts = Vec::new();
        for entry in fs::read_dir(self.store)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => accounts.push(name),
                Err(name) => debug!(?name, "Skipping account directory with non UTF-8 name"),
            }
        }
        accounts.sort();

        for account in accounts {
            let Some(owner) = self.accounts.owner(&account) else {
                debug!(account, "Skipping directory without an account definition");
                continue;
            };
            if self
                .owners
                .is_some_and(|owners| !owners.iter().any(|o| o.eq_ignore_ascii_case(owner)))
            {
                debug!(account, owner, "Skipping account not selected");
                continue;
            }
            self.collect_account(&account, found)?;
        }
        Ok(())
    }

    fn collect_account(&self, account: &str, found: &mut Vec<StoredFile>) -> io::Result<()> {
        let mut resolved = None;

        for day in DayWalk::new(&self.store.join(account))? {
            let day = day?;
            let bounds = *resolved.get_or_insert_with(|| self.bounds.resolve(day.date));
            if bounds.is_below_earliest(day.date) {
                break;
            }
            if bounds.is_above_most_recent(day.date) {
                continue;
            }

            for entry in fs::read_dir(&day.path)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let Ok(name) = entry.file_name().into_string() else {
                    warn!(path = %entry.path().display(), "Skipping message file with non UTF-8 name");
                    continue;
                };
                found.push(StoredFile {
                    account: account.to_string(),
                    date: day.date,
                    name,
                    path: entry.path(),
                });
            }
        }
        Ok(())
    }
}

/// A day directory of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DayDir {
    date: NaiveDate,
    path: PathBuf,
}

/// Lazy walk over an account's day directories, newest first.
///
/// Each level is listed only when the walk reaches it, so a caller that
/// stops early never lists older years or months.
#[derive(Debug)]
struct DayWalk {
    /// Ascending, so `pop` yields the newest.
    years: Vec<(u32, PathBuf)>,
    months: Vec<(i32, u32, PathBuf)>,
    days: Vec<DayDir>,
}

impl DayWalk {
    fn new(account: &Path) -> io::Result<Self> {
        Ok(Self {
            years: numbered_dirs(account, 4)?,
            months: Vec::new(),
            days: Vec::new(),
        })
    }

    fn descend(&mut self) -> Option<io::Result<()>> {
        if let Some((year, month, path)) = self.months.pop() {
            return Some(numbered_dirs(&path, 2).map(|days| {
                self.days = days
                    .into_iter()
                    .filter_map(|(day, path)| match NaiveDate::from_ymd_opt(year, month, day) {
                        Some(date) => Some(DayDir { date, path }),
                        None => {
                            warn!(path = %path.display(), "Skipping directory that is not a calendar day");
                            None
                        }
                    })
                    .collect();
            }));
        }

        let (year, path) = self.years.pop()?;
        let Ok(year) = i32::try_from(year) else {
            return Some(Ok(()));
        };
        Some(numbered_dirs(&path, 2).map(|months| {
            self.months = months
                .into_iter()
                .map(|(month, path)| (year, month, path))
                .collect();
        }))
    }
}

impl Iterator for DayWalk {
    type Item = io::Result<DayDir>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(day) = self.days.pop() {
                return Some(Ok(day));
            }
            if let Err(e) = self.descend()? {
                return Some(Err(e));
            }
        }
    }
}

/// Lists subdirectories named by exactly `width` digits, ascending.
fn numbered_dirs(dir: &Path, width: usize) -> io::Result<Vec<(u32, PathBuf)>> {
    let mut numbered = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let number = name
            .to_str()
            .filter(|name| name.len() == width && name.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|name| name.parse().ok());
        match number {
            Some(number) => numbered.push((number, entry.path())),
            None => warn!(path = %entry.path().display(), "Skipping unexpected directory in store"),
        }
    }
    numbered.sort();
    Ok(numbered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::needless_collect)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEFS: &[u8] = b"[Account1]\nEmail=me@x.com\n[Account2]\nEmail=you@x.com\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (relative, content) in [
            ("account1/2024/03/15/10", "ten"),
            ("account1/2024/03/15/9", "nine"),
            ("account1/2024/03/15/7", "seven"),
            ("account1/2024/01/02/3", "three"),
            ("account1/2023/03/15/1", "boundary"),
            ("account1/2023/03/14/2", "too old"),
            ("account1/2022/06/01/4", "much too old"),
            ("account2/2024/02/01/5", "other account"),
            ("account3/2024/02/01/6", "undefined account"),
        ] {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn accounts() -> AccountMap {
        AccountMap::parse(DEFS, Path::new("accounts.ini")).unwrap()
    }

    fn names(files: &[StoredFile]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_default_bounds_select_latest_year() {
        let store = store();
        let accounts = accounts();
        let owners = BTreeSet::from(["me@x.com".to_string()]);
        let scanner =
            DirectoryScanner::new(store.path(), &accounts, Some(&owners), DateBounds::default());

        let files = scanner.scan().unwrap();
        assert_eq!(names(&files), vec!["1", "3", "7", "9", "10"]);
        assert!(files.iter().all(|f| f.account == "account1"));
        assert!(files.iter().all(|f| f.date >= date(2023, 3, 15)));
    }

    #[test]
    fn test_account_selection_ignores_case() {
        let store = store();
        let defs = b"[Account1]\nEmail=Me@X.com\n[Account2]\nEmail=you@x.com\n";
        let accounts = AccountMap::parse(defs, Path::new("accounts.ini")).unwrap();
        let owners = BTreeSet::from(["me@x.COM".to_string()]);
        let bounds = DateBounds::new(Some(date(2024, 1, 1)), None);
        let files = DirectoryScanner::new(store.path(), &accounts, Some(&owners), bounds)
            .scan()
            .unwrap();

        assert_eq!(names(&files), vec!["3", "7", "9", "10"]);
        assert!(files.iter().all(|f| f.account == "account1"));
    }

    #[test]
    fn test_explicit_bounds() {
        let store = store();
        let accounts = accounts();
        let bounds = DateBounds::new(Some(date(2024, 1, 1)), Some(date(2024, 2, 28)));
        let files = DirectoryScanner::new(store.path(), &accounts, None, bounds)
            .scan()
            .unwrap();

        assert_eq!(names(&files), vec!["3", "5"]);
        for file in &files {
            assert!(bounds.contains(file.date));
        }
    }

    #[test]
    fn test_unknown_layout_skipped() {
        let store = store();
        fs::create_dir_all(store.path().join("account1/notes")).unwrap();
        fs::create_dir_all(store.path().join("account1/2024/13/01")).unwrap();
        fs::create_dir_all(store.path().join("account1/2024/02/30")).unwrap();
        fs::write(store.path().join("account1/2024/readme"), "x").unwrap();

        let accounts = accounts();
        let owners = BTreeSet::from(["me@x.com".to_string()]);
        let files =
            DirectoryScanner::new(store.path(), &accounts, Some(&owners), DateBounds::default())
                .scan()
                .unwrap();
        assert_eq!(files.len(), 5);
    }

    #[test]
    fn test_missing_store_is_scan_error() {
        let dir = TempDir::new().unwrap();
        let accounts = accounts();
        let missing = dir.path().join("missing");
        let err = DirectoryScanner::new(&missing, &accounts, None, DateBounds::default())
            .scan()
            .unwrap_err();
        assert!(matches!(err, Error::Scan { collected: 0, last: None, .. }));
    }

    #[test]
    fn test_walk_is_newest_first() {
        let store = store();
        let days: Vec<_> = DayWalk::new(&store.path().join("account1"))
            .unwrap()
            .map(|day| day.unwrap().date)
            .collect();
        assert_eq!(
            days,
            vec![
                date(2024, 3, 15),
                date(2024, 1, 2),
                date(2023, 3, 15),
                date(2023, 3, 14),
                date(2022, 6, 1),
            ]
        );
    }
}
