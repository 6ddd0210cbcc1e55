//! Remove command: delete a stored fact.

use std::io::Write;

use anyhow::{Context, Result};
use nark_core::{Datastore, FactId, FactManager};

use super::util::write_fact;

pub fn run<W: Write, S: Datastore>(
    writer: &mut W,
    manager: &mut FactManager<S>,
    id: FactId,
    purge: bool,
) -> Result<()> {
    let zone = manager.config().timezone;
    let fact = manager
        .remove(id, purge)
        .with_context(|| format!("failed to remove fact {id}"))?;
    write!(writer, "{}: ", if purge { "purged" } else { "removed" })?;
    write_fact(writer, &fact, zone)?;
    Ok(())
}
