//! Check command: validate a factoid without storing it.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use nark_core::{Datastore, FactManager, TimeHint};

use super::util::{write_fact, write_warnings};

/// Prints the fact a factoid would produce, or every reason it would be
/// rejected.
pub fn run<W: Write, S: Datastore>(
    writer: &mut W,
    manager: &FactManager<S>,
    factoid: &str,
    hint: TimeHint,
    now: DateTime<Utc>,
) -> Result<()> {
    let prepared = manager.prepare_from_factoid_at(factoid, hint, now)?;
    match manager.validator(now).validate_all(prepared.candidate) {
        Ok(fact) => {
            write!(writer, "ok: ")?;
            write_fact(writer, &fact, manager.config().timezone)?;
            write_warnings(writer, &prepared.warnings)?;
            Ok(())
        }
        Err(errors) => {
            for err in &errors {
                writeln!(writer, "error: {err}")?;
            }
            bail!("factoid has {} problem(s)", errors.len())
        }
    }
}
