//! `mailcollect` - collect emails from local mail stores into individual files.
//!
//! Reads a selection rules file, selects the matching emails from an Opera
//! directory store or mbox archives, and copies them into the configured
//! output directory without ever overwriting a stored email.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod command;
mod view;

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mailcollect_core::{Classification, CopyReport, EmailCollector};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use command::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailcollect=info,mailcollect_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut collector = EmailCollector::load(&cli.rules)
        .with_context(|| format!("cannot read selection rules {}", cli.rules.display()))?;
    collector
        .try_parse()
        .with_context(|| format!("invalid selection rules {}", cli.rules.display()))?;

    match cli.command {
        Command::Show => show(&mut collector),
        Command::Apply { yes } => apply(&mut collector, yes),
        Command::Exclude { filename } => exclude(&mut collector, &cli.rules, &filename),
        Command::Include { filename } => include(&mut collector, &cli.rules, &filename),
    }
}

/// Lists the selection and how each email relates to the output directory.
fn show(collector: &mut EmailCollector) -> Result<()> {
    let records = collector.selected_candidates()?.to_vec();
    let reconciliation = collector.reconcile()?;
    let mut out = io::stdout().lock();
    view::write_reconciliation(&mut out, &records, &reconciliation)?;
    drop(reconciliation);

    let missing = collector.missing_archives();
    view::write_missing_archives(&mut out, missing)?;
    Ok(())
}

/// Copies the new emails after confirmation.
fn apply(collector: &mut EmailCollector, yes: bool) -> Result<()> {
    let missing = collector.selection()?.missing_archives().to_vec();
    let mut out = io::stdout().lock();
    view::write_missing_archives(&mut out, &missing)?;

    let reconciliation = collector.reconcile()?;
    let new = reconciliation.count(Classification::New);
    if reconciliation.veto().is_none() {
        if new == 0 {
            writeln!(out, "Nothing to copy.")?;
            return Ok(());
        }
        let question = format!(
            "Copy {new} emails to {}?",
            reconciliation.output_dir().display()
        );
        if !yes && !confirm(&mut out, &question)? {
            info!("Copy declined");
            return Ok(());
        }
    }

    match reconciliation.execute()? {
        CopyReport::Refused(veto) => {
            view::write_veto(&mut out, &veto)?;
            bail!("nothing copied");
        }
        CopyReport::Copied { written, failed } => {
            writeln!(out, "Copied {written} emails.")?;
            for filename in &failed {
                writeln!(out, "  not written: {filename}")?;
            }
        }
    }
    Ok(())
}

/// Excludes an email and saves the rules file.
fn exclude(collector: &mut EmailCollector, rules: &Path, filename: &str) -> Result<()> {
    if !collector.add_exclusion(filename) {
        println!("{filename} is already excluded.");
        return Ok(());
    }
    save(collector, rules)?;
    if collector.is_stored(filename) {
        println!("{filename} is already stored; remove it before the next copy.");
    }
    Ok(())
}

/// Removes an exclusion and saves the rules file.
fn include(collector: &mut EmailCollector, rules: &Path, filename: &str) -> Result<()> {
    if !collector.remove_exclusion(filename) {
        println!("{filename} is not excluded.");
        return Ok(());
    }
    save(collector, rules)
}

fn save(collector: &EmailCollector, rules: &Path) -> Result<()> {
    std::fs::write(rules, collector.text())
        .with_context(|| format!("cannot write selection rules {}", rules.display()))?;
    info!(rules = %rules.display(), "Saved selection rules");
    Ok(())
}

fn confirm(out: &mut impl Write, question: &str) -> Result<bool> {
    write!(out, "{question} [y/N] ")?;
    out.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}
