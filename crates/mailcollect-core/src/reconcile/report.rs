//! Copy outcomes.

use std::fmt;

/// Why a copy was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Veto {
    /// Selected emails differ from stored files of the same name.
    Changed(Vec<String>),
    /// Excluded emails are stored.
    ExcludedPresent(Vec<String>),
    /// The new emails would land between stored ones.
    RangeOverlap {
        /// Lowest and highest stored filename.
        stored: (String, String),
        /// Lowest and highest new filename.
        new: (String, String),
    },
}

impl fmt::Display for Veto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed(names) => {
                write!(f, "{} selected emails differ from the stored copies: {}", names.len(), names.join(", "))
            }
            Self::ExcludedPresent(names) => {
                write!(f, "{} excluded emails are stored: {}", names.len(), names.join(", "))
            }
            Self::RangeOverlap { stored, new } => write!(
                f,
                "new emails {} .. {} overlap stored emails {} .. {}",
                new.0, new.1, stored.0, stored.1
            ),
        }
    }
}

/// Outcome of a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyReport {
    /// Nothing was written.
    Refused(Veto),
    /// New emails were written.
    Copied {
        /// Files written.
        written: usize,
        /// Files that could not be written because a directory vanished.
        failed: Vec<String>,
    },
}

impl CopyReport {
    /// Number of files written, or `None` if the copy was refused.
    #[must_use]
    pub const fn written(&self) -> Option<usize> {
        match self {
            Self::Refused(_) => None,
            Self::Copied { written, .. } => Some(*written),
        }
    }

    /// The veto, if the copy was refused.
    #[must_use]
    pub const fn veto(&self) -> Option<&Veto> {
        match self {
            Self::Refused(veto) => Some(veto),
            Self::Copied { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veto_display() {
        let veto = Veto::RangeOverlap {
            stored: ("a".to_string(), "c".to_string()),
            new: ("b".to_string(), "b".to_string()),
        };
        assert_eq!(veto.to_string(), "new emails b .. b overlap stored emails a .. c");
        assert_eq!(
            Veto::Changed(vec!["x".to_string()]).to_string(),
            "1 selected emails differ from the stored copies: x"
        );
    }

    #[test]
    fn test_report_accessors() {
        let refused = CopyReport::Refused(Veto::ExcludedPresent(vec![]));
        assert_eq!(refused.written(), None);
        assert!(refused.veto().is_some());

        let copied = CopyReport::Copied { written: 2, failed: vec![] };
        assert_eq!(copied.written(), Some(2));
        assert!(copied.veto().is_none());
    }
}
