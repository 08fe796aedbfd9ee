//! Plain text rendering of selections and copy outcomes.

use std::io::{self, Write};
use std::path::PathBuf;

use chrono::Local;
use mailcollect_core::{Classification, EmailRecord, Reconciliation, Veto};

/// One-character marker for a classification.
const fn marker(class: Classification) -> char {
    match class {
        Classification::New => '+',
        Classification::Equal => '=',
        Classification::Changed => '!',
        Classification::ExcludedAbsent => '-',
        Classification::ExcludedPresent => 'x',
    }
}

/// Formats a send time in the local timezone, as "Thu, 15 Jan 2026 14:31".
fn format_date_local(record: &EmailRecord) -> String {
    record
        .sent_at
        .with_timezone(&Local)
        .format("%a, %d %b %Y %H:%M")
        .to_string()
}

/// Writes one line per selected email, then a summary.
pub fn write_reconciliation(
    out: &mut impl Write,
    records: &[EmailRecord],
    reconciliation: &Reconciliation<'_>,
) -> io::Result<()> {
    for record in records {
        let mark = reconciliation
            .classification(&record.filename)
            .map_or(' ', marker);
        writeln!(
            out,
            "{mark} {}  {:<30}  {}",
            format_date_local(record),
            record.from_address,
            record.subject
        )?;
        writeln!(out, "    {}", record.filename)?;
    }

    writeln!(
        out,
        "{} selected: {} new, {} already stored, {} excluded. Output: {} ({} files)",
        records.len(),
        reconciliation.count(Classification::New),
        reconciliation.count(Classification::Equal),
        reconciliation.count(Classification::ExcludedAbsent)
            + reconciliation.count(Classification::ExcludedPresent),
        reconciliation.output_dir().display(),
        reconciliation.stored().len(),
    )?;

    if let Some(veto) = reconciliation.veto() {
        write_veto(out, &veto)?;
    }
    Ok(())
}

/// Explains why nothing will be copied.
pub fn write_veto(out: &mut impl Write, veto: &Veto) -> io::Result<()> {
    writeln!(out, "Copy refused: {veto}")?;
    let advice = match veto {
        Veto::Changed(_) => "Stored emails differ from the selection; check the output directory.",
        Veto::ExcludedPresent(_) => "Remove the excluded emails from the output directory or include them again.",
        Veto::RangeOverlap { .. } => "Choose dates before or after the emails already stored.",
    };
    writeln!(out, "{advice}")
}

/// Lists configured archives that were not found.
pub fn write_missing_archives(out: &mut impl Write, missing: &[PathBuf]) -> io::Result<()> {
    for archive in missing {
        writeln!(out, "Mail archive not found: {}", archive.display())?;
    }
    Ok(())
}
