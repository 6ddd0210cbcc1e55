//! Add command: store a fact written as a factoid.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nark_core::{ConflictEdit, Datastore, FactManager, TimeHint};

use super::util::{write_fact, write_warnings};

pub fn run<W: Write, S: Datastore>(
    writer: &mut W,
    manager: &mut FactManager<S>,
    factoid: &str,
    hint: TimeHint,
    force: bool,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let zone = manager.config().timezone;

    if force {
        let forced = manager
            .add_from_factoid_forcefully_at(factoid, hint, now)
            .context("failed to add fact")?;
        if json {
            serde_json::to_writer_pretty(&mut *writer, &forced)?;
            writeln!(writer)?;
            return Ok(());
        }
        write_fact(writer, &forced.fact, zone)?;
        for edit in &forced.edits {
            let verb = match edit {
                ConflictEdit::Trim { .. } => "trimmed",
                ConflictEdit::Stop { .. } => "stopped",
                ConflictEdit::Delete { .. } => "deleted",
                ConflictEdit::Split { .. } => "split",
            };
            for fact in edit.facts() {
                write!(writer, "{verb}: ")?;
                write_fact(writer, fact, zone)?;
            }
        }
        write_warnings(writer, &forced.warnings)?;
        return Ok(());
    }

    let created = manager
        .add_from_factoid_at(factoid, hint, now)
        .context("failed to add fact")?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &created)?;
        writeln!(writer)?;
        return Ok(());
    }
    write_fact(writer, &created.fact, zone)?;
    write_warnings(writer, &created.warnings)?;
    Ok(())
}
