//! Stop command: close the ongoing fact.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nark_core::{Datastore, FactManager};

use super::util::{format_duration, resolve_at, write_fact};

pub fn run<W: Write, S: Datastore>(
    writer: &mut W,
    manager: &mut FactManager<S>,
    at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let zone = manager.config().timezone;
    let end = at.map(|raw| resolve_at(raw, zone, now)).transpose()?;
    let fact = manager
        .stop_ongoing_at(end, now)
        .context("failed to stop fact")?;
    write!(writer, "stopped: ")?;
    write_fact(writer, &fact, zone)?;
    if let Some(duration) = fact.duration() {
        writeln!(writer, "duration: {}", format_duration(duration))?;
    }
    Ok(())
}
