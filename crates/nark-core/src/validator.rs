//! Consistency checks that turn a candidate into a fact.

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::error::{Error, TimeRangeError};
use crate::fact::{Candidate, Fact};
use crate::store::Datastore;

/// Validates candidates against a datastore.
///
/// Checks run in order: time range and minimum duration, the single ongoing
/// fact, then overlaps with stored facts. Ongoing facts in the store count
/// as lasting until `now`. The store is only read.
#[derive(Debug)]
pub struct FactValidator<'a, S> {
    store: &'a S,
    config: EngineConfig,
    now: DateTime<Utc>,
}

impl<'a, S: Datastore> FactValidator<'a, S> {
    pub const fn new(store: &'a S, config: EngineConfig, now: DateTime<Utc>) -> Self {
        Self { store, config, now }
    }

    /// Stops at the first failed check.
    pub fn validate(&self, candidate: Candidate) -> Result<Fact, Error> {
        match self.check(&candidate, true).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(Fact::accept(candidate)),
        }
    }

    /// Runs every check and reports all failures.
    pub fn validate_all(&self, candidate: Candidate) -> Result<Fact, Vec<Error>> {
        let errors = self.check(&candidate, false);
        if errors.is_empty() {
            Ok(Fact::accept(candidate))
        } else {
            Err(errors)
        }
    }

    fn check(&self, candidate: &Candidate, fail_fast: bool) -> Vec<Error> {
        let mut errors = Vec::new();

        let range_ok = match check_range(candidate, &self.config) {
            Ok(()) => true,
            Err(err) => {
                errors.push(err.into());
                if fail_fast {
                    return errors;
                }
                false
            }
        };

        if candidate.end.is_none() {
            match self.store.ongoing_fact() {
                Ok(Some(other)) if Some(other.id) != candidate.id => {
                    errors.push(Error::OngoingConflict {
                        id: other.id,
                        start: other.start,
                    });
                    if fail_fast {
                        return errors;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    errors.push(err.into());
                    return errors;
                }
            }
        }

        if !range_ok {
            return errors;
        }

        let stored = match self
            .store
            .facts_overlapping(candidate.start, candidate.end, candidate.id)
        {
            Ok(stored) => stored,
            Err(err) => {
                errors.push(err.into());
                return errors;
            }
        };
        for record in stored {
            if candidate.split_from == Some(record.id) {
                continue;
            }
            // Open against open is the ongoing conflict above.
            if candidate.end.is_none() && record.end.is_none() {
                continue;
            }
            let record_end = record.end.unwrap_or_else(|| self.now.max(record.start));
            let start = candidate.start.max(record.start);
            let end = candidate.end.map_or(record_end, |end| end.min(record_end));
            if start < end {
                tracing::debug!(fact_id = %record.id, %start, %end, "overlap found");
                errors.push(Error::Overlap {
                    fact_id: record.id,
                    start,
                    end,
                });
                if fail_fast {
                    return errors;
                }
            }
        }
        errors
    }
}

/// Ordering and minimum duration of a closed range.
pub(crate) fn check_range(
    candidate: &Candidate,
    config: &EngineConfig,
) -> Result<(), TimeRangeError> {
    let Some(end) = candidate.end else {
        return Ok(());
    };
    if end <= candidate.start {
        return Err(TimeRangeError::EndBeforeStart {
            start: candidate.start,
            end,
        });
    }
    let actual = end - candidate.start;
    if actual < config.min_delta() {
        return Err(TimeRangeError::TooShort {
            actual: actual.num_seconds(),
            minimum: i64::from(config.fact_min_delta),
        });
    }
    Ok(())
}
