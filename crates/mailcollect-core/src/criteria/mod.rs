//! Selection criteria.
//!
//! Selection rules are a line-oriented `key value` document. [`SelectionRules`]
//! holds the document as written; [`SelectionCriteria`] is the validated,
//! typed form the scanners and the reconciler work from.

mod dates;
mod model;
pub mod rules;

pub use dates::parse_date_bound;
pub use model::{DEFAULT_COLLECTED, MailStore, MailboxStyle, SelectionCriteria};
pub use rules::{COLLECTED_CONF, SelectionRules};
