//! # mailcollect-core
//!
//! Email selection and non-destructive copying for local mail stores.
//!
//! This crate provides:
//! - Selection rules parsing and validation
//! - Opera directory store and mbox archive scanning
//! - Sender filtering
//! - Canonical output filenames
//! - **Copy reconciliation** - refuses any copy that could overwrite or
//!   interleave with emails already stored
//! - An orchestrator tying these together for front ends

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
mod collector;
pub mod criteria;
mod error;
pub mod filename;
pub mod filter;
pub mod reconcile;
mod record;
pub mod scan;

pub use account::AccountMap;
pub use collector::{EmailCollector, FilenameMap, Selection};
pub use criteria::{
    COLLECTED_CONF, DEFAULT_COLLECTED, MailStore, MailboxStyle, SelectionCriteria, SelectionRules,
};
pub use error::{Error, Result};
pub use filename::{DeriveFilename, derive_filename};
pub use filter::{SenderFilter, SenderPolicy};
pub use reconcile::{Classification, CopyReport, Reconciliation, Veto};
pub use record::{EmailRecord, SelectedEmail};
pub use scan::{DateBounds, Locator};
