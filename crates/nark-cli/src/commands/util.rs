//! Shared utilities for CLI commands.

use std::io::{self, Write};

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use nark_core::{Fact, LocalZone, TimeContext, TimeHint, Warning, parse_time, resolve_times};

/// Resolves a single time argument, such as `09:30`, `-15m` or
/// `2019-02-16 09:30`, the way a factoid start would be.
pub fn resolve_at(raw: &str, zone: LocalZone, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let token = parse_time(raw).with_context(|| format!("invalid time {raw:?}"))?;
    let ctx = TimeContext {
        now,
        zone,
        ongoing: None,
    };
    let times = resolve_times(Some(token), None, TimeHint::VerifyNone, &ctx)
        .with_context(|| format!("failed to resolve time {raw:?}"))?;
    Ok(times.start)
}

/// Writes `[id] factoid`, or just the factoid for an unsaved fact.
pub fn write_fact<W: Write>(writer: &mut W, fact: &Fact, zone: LocalZone) -> io::Result<()> {
    match fact.id() {
        Some(id) => writeln!(writer, "[{id}] {}", fact.to_factoid(zone)),
        None => writeln!(writer, "{}", fact.to_factoid(zone)),
    }
}

pub fn write_warnings<W: Write>(writer: &mut W, warnings: &[Warning]) -> io::Result<()> {
    for warning in warnings {
        writeln!(writer, "note: {warning}")?;
    }
    Ok(())
}

/// Formats a duration as `1h 05m`, or `12m` under an hour.
pub fn format_duration(duration: TimeDelta) -> String {
    let minutes = duration.num_minutes().max(0);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}
