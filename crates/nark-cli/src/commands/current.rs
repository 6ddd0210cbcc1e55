//! Current command: show the ongoing fact.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use nark_core::{Datastore, FactManager};

use super::util::{format_duration, write_fact};

pub fn run<W: Write, S: Datastore>(
    writer: &mut W,
    manager: &FactManager<S>,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let current = manager.current()?;
    if json {
        serde_json::to_writer_pretty(&mut *writer, &current)?;
        writeln!(writer)?;
        return Ok(());
    }

    let Some(fact) = current else {
        writeln!(writer, "No ongoing fact.")?;
        return Ok(());
    };
    write_fact(writer, &fact, manager.config().timezone)?;
    writeln!(writer, "running for {}", format_duration(now - fact.start()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use nark_core::{EngineConfig, LocalZone};
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

    fn current(manager: &FactManager<Database>, json: bool) -> String {
        let mut output = Vec::new();
        run(&mut output, manager, json, at("10:40")).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn reports_no_ongoing_fact() {
        let manager = manager();
        assert_snapshot!(current(&manager, false), @"No ongoing fact.");
        assert_snapshot!(current(&manager, true), @"null");
    }

    #[test]
    fn shows_ongoing_fact_with_elapsed_time() {
        let mut manager = manager();
        manager
            .start_ongoing_at("reading@home: chapter 3", None, at("09:00"))
            .unwrap();
        assert_snapshot!(current(&manager, false), @r"
        [1] 2019-02-16 09:00:00+00:00: reading@home: chapter 3
        running for 1h 40m
        ");
    }
}
