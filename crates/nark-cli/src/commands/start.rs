//! Start command: open a new ongoing fact.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nark_core::{Datastore, FactManager};

use super::util::{resolve_at, write_fact};

pub fn run<W: Write, S: Datastore>(
    writer: &mut W,
    manager: &mut FactManager<S>,
    activity: &str,
    at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let zone = manager.config().timezone;
    let start = at.map(|raw| resolve_at(raw, zone, now)).transpose()?;
    let fact = manager
        .start_ongoing_at(activity, start, now)
        .context("failed to start fact")?;
    write!(writer, "started: ")?;
    write_fact(writer, &fact, zone)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use nark_core::{EngineConfig, Error, LocalZone};
    use nark_db::Database;

    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        format!("2019-02-16T{s}:00Z").parse().unwrap()
    }

    fn manager() -> FactManager<Database> {
        let config = EngineConfig {
            timezone: LocalZone::Utc,
            ..EngineConfig::default()
        };
        FactManager::new(Database::open_in_memory().unwrap(), config)
    }

    #[test]
    fn start_uses_given_time() {
        let mut manager = manager();
        let mut output = Vec::new();
        run(
            &mut output,
            &mut manager,
            "reading@home: #book",
            Some("-30m"),
            at("12:00"),
        )
        .unwrap();
        assert_snapshot!(
            String::from_utf8(output).unwrap(),
            @"started: [1] 2019-02-16 11:30:00+00:00: reading@home: #book"
        );
    }

    #[test]
    fn second_start_fails_with_ongoing_conflict() {
        let mut manager = manager();
        let mut output = Vec::new();
        run(&mut output, &mut manager, "reading", None, at("12:00")).unwrap();
        let err = run(&mut output, &mut manager, "writing", None, at("12:30")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::OngoingConflict { .. })
        ));
    }
}
