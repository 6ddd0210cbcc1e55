//! Cancel command: discard the ongoing fact.

use std::io::Write;

use anyhow::{Context, Result};
use nark_core::{Datastore, FactManager};

use super::util::write_fact;

pub fn run<W: Write, S: Datastore>(writer: &mut W, manager: &mut FactManager<S>) -> Result<()> {
    let zone = manager.config().timezone;
    let fact = manager
        .cancel_ongoing()
        .context("failed to cancel fact")?;
    write!(writer, "cancelled: ")?;
    write_fact(writer, &fact, zone)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use insta::assert_snapshot;
    use nark_core::{EngineConfig, LocalZone};
    use nark_db::Database;

    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        format!("2019-02-16T{s}:00Z").parse().unwrap()
    }

    #[test]
    fn cancel_discards_ongoing_fact() {
        let config = EngineConfig {
            timezone: LocalZone::Utc,
            ..EngineConfig::default()
        };
        let mut manager = FactManager::new(Database::open_in_memory().unwrap(), config);
        manager.start_ongoing_at("reading", None, at("09:00")).unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut manager).unwrap();
        assert_snapshot!(
            String::from_utf8(output).unwrap(),
            @"cancelled: [1] 2019-02-16 09:00:00+00:00: reading"
        );
        assert!(manager.current().unwrap().is_none());
        // The slot is free again.
        manager.start_ongoing_at("writing", None, at("09:30")).unwrap();
    }
}
