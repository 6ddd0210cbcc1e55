//! Planning of edits that make room for a fact.
//!
//! Nothing here is applied implicitly: the manager only uses a plan when the
//! caller asks for a forced save.

use chrono::TimeDelta;
use serde::Serialize;

use crate::fact::{Fact, FactRecord};

/// A change to a stored fact that clears the way for a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum ConflictEdit {
    /// The stored fact was shortened.
    Trim { fact: Fact },
    /// The ongoing fact was closed where the new one starts.
    Stop { fact: Fact },
    /// The stored fact lies wholly under the new one.
    Delete { fact: Fact },
    /// The stored fact contained the new one and was cut in two. `left`
    /// keeps the stored id; `right` is new and records `split_from`. When
    /// the stored fact was ongoing, `right` carries it on from the new
    /// fact's end.
    Split { left: Fact, right: Fact },
}

impl ConflictEdit {
    /// The edited facts, in the order they should be written.
    pub fn facts(&self) -> Vec<&Fact> {
        match self {
            Self::Trim { fact } | Self::Stop { fact } | Self::Delete { fact } => vec![fact],
            Self::Split { left, right } => vec![left, right],
        }
    }
}

/// Computes the edits that remove every overlap between `fact` and `stored`.
///
/// `stored` are the facts intersecting `fact`, as returned by
/// `Datastore::facts_overlapping`, with ongoing facts unbounded. A piece left
/// shorter than `min_delta` is deleted rather than kept.
pub fn plan_conflicts(
    fact: &Fact,
    stored: Vec<FactRecord>,
    min_delta: TimeDelta,
) -> Vec<ConflictEdit> {
    let (start, end) = (fact.start(), fact.end());
    let too_short = |length: TimeDelta| length <= TimeDelta::zero() || length < min_delta;
    let mut edits = Vec::new();

    for record in stored {
        if fact.id() == Some(record.id) || fact.split_from() == Some(record.id) || record.deleted {
            continue;
        }
        let mut conflict = Fact::from_record(record);
        let (other_start, other_end) = (conflict.start(), conflict.end());

        if start <= other_start {
            match end {
                Some(end) if end <= other_start => continue,
                Some(end) if other_end.is_none_or(|other_end| end < other_end) => {
                    if other_end.is_some_and(|other_end| too_short(other_end - end)) {
                        conflict.mark_deleted();
                        edits.push(ConflictEdit::Delete { fact: conflict });
                    } else {
                        conflict.set_start(end);
                        edits.push(ConflictEdit::Trim { fact: conflict });
                    }
                }
                _ => {
                    conflict.mark_deleted();
                    edits.push(ConflictEdit::Delete { fact: conflict });
                }
            }
            continue;
        }

        let ends_after = match (end, other_end) {
            (Some(end), Some(other_end)) => end >= other_end,
            (Some(_), None) => false,
            (None, _) => true,
        };
        if ends_after {
            if other_end.is_some_and(|other_end| start >= other_end) {
                continue;
            }
            if too_short(start - other_start) {
                conflict.mark_deleted();
                edits.push(ConflictEdit::Delete { fact: conflict });
            } else {
                let was_ongoing = conflict.is_ongoing();
                conflict.set_end(start);
                edits.push(if was_ongoing {
                    ConflictEdit::Stop { fact: conflict }
                } else {
                    ConflictEdit::Trim { fact: conflict }
                });
            }
            continue;
        }

        // The new fact lies strictly inside the stored one, which may be
        // ongoing.
        let Some(end) = end else {
            continue;
        };
        let keep_left = !too_short(start - other_start);
        let keep_right = other_end.is_none_or(|other_end| !too_short(other_end - end));
        match (keep_left, keep_right) {
            (true, true) => {
                let mut right = conflict.clone();
                right.set_start(end);
                right.detach_as_split();
                conflict.set_end(start);
                edits.push(ConflictEdit::Split {
                    left: conflict,
                    right,
                });
            }
            (true, false) => {
                conflict.set_end(start);
                edits.push(ConflictEdit::Trim { fact: conflict });
            }
            (false, true) => {
                conflict.set_start(end);
                edits.push(ConflictEdit::Trim { fact: conflict });
            }
            (false, false) => {
                conflict.mark_deleted();
                edits.push(ConflictEdit::Delete { fact: conflict });
            }
        }
    }

    tracing::debug!(edits = edits.len(), "planned conflict edits");
    edits
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::entity::Activity;
    use crate::fact::Candidate;
    use crate::types::FactId;

    fn at(s: &str) -> DateTime<Utc> {
        format!("2019-02-16T{s}:00Z").parse().unwrap()
    }

    fn activity() -> Activity {
        Activity::new("act", None).unwrap()
    }

    fn new_fact(start: &str, end: Option<&str>) -> Fact {
        let mut candidate = Candidate::new(activity(), at(start));
        candidate.end = end.map(at);
        Fact::accept(candidate)
    }

    fn record(id: i64, start: &str, end: Option<&str>) -> FactRecord {
        FactRecord {
            id: FactId::new(id),
            start: at(start),
            end: end.map(at),
            activity: activity(),
            tags: Vec::new(),
            description: None,
            deleted: false,
            split_from: None,
        }
    }

    fn range(fact: &Fact) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        (fact.start(), fact.end())
    }

    #[test]
    fn trims_start_of_later_fact() {
        let edits = plan_conflicts(
            &new_fact("09:00", Some("10:00")),
            vec![record(1, "09:30", Some("11:00"))],
            TimeDelta::zero(),
        );
        let [ConflictEdit::Trim { fact }] = edits.as_slice() else {
            panic!("expected one trim, got {edits:?}");
        };
        assert_eq!(range(fact), (at("10:00"), Some(at("11:00"))));
        assert_eq!(fact.id(), Some(FactId::new(1)));
    }

    #[test]
    fn trims_end_of_earlier_fact() {
        let edits = plan_conflicts(
            &new_fact("09:00", Some("10:00")),
            vec![record(1, "08:00", Some("09:30"))],
            TimeDelta::zero(),
        );
        let [ConflictEdit::Trim { fact }] = edits.as_slice() else {
            panic!("expected one trim, got {edits:?}");
        };
        assert_eq!(range(fact), (at("08:00"), Some(at("09:00"))));
    }

    #[test]
    fn stops_ongoing_fact() {
        let edits = plan_conflicts(
            &new_fact("10:00", None),
            vec![record(1, "08:00", None)],
            TimeDelta::zero(),
        );
        let [ConflictEdit::Stop { fact }] = edits.as_slice() else {
            panic!("expected one stop, got {edits:?}");
        };
        assert_eq!(range(fact), (at("08:00"), Some(at("10:00"))));
    }

    #[test]
    fn closed_fact_inside_ongoing_fact_resumes_it() {
        let edits = plan_conflicts(
            &new_fact("10:00", Some("11:00")),
            vec![record(1, "08:00", None)],
            TimeDelta::zero(),
        );
        let [ConflictEdit::Split { left, right }] = edits.as_slice() else {
            panic!("expected one split, got {edits:?}");
        };
        assert_eq!(left.id(), Some(FactId::new(1)));
        assert_eq!(range(left), (at("08:00"), Some(at("10:00"))));
        assert_eq!(right.split_from(), Some(FactId::new(1)));
        assert_eq!(range(right), (at("11:00"), None));
    }

    #[test]
    fn closed_fact_at_ongoing_start_moves_it() {
        let edits = plan_conflicts(
            &new_fact("08:05", Some("09:00")),
            vec![record(1, "08:00", None)],
            TimeDelta::minutes(10),
        );
        let [ConflictEdit::Trim { fact }] = edits.as_slice() else {
            panic!("expected one trim, got {edits:?}");
        };
        assert_eq!(range(fact), (at("09:00"), None));
        assert!(fact.is_ongoing());
    }

    #[test]
    fn deletes_covered_fact() {
        let edits = plan_conflicts(
            &new_fact("09:00", Some("12:00")),
            vec![record(1, "09:30", Some("10:00")), record(2, "09:00", Some("12:00"))],
            TimeDelta::zero(),
        );
        assert_eq!(edits.len(), 2);
        for edit in &edits {
            let ConflictEdit::Delete { fact } = edit else {
                panic!("expected delete, got {edit:?}");
            };
            assert!(fact.is_deleted());
        }
    }

    #[test]
    fn splits_containing_fact() {
        let edits = plan_conflicts(
            &new_fact("10:00", Some("11:00")),
            vec![record(7, "09:00", Some("12:00"))],
            TimeDelta::zero(),
        );
        let [ConflictEdit::Split { left, right }] = edits.as_slice() else {
            panic!("expected one split, got {edits:?}");
        };
        assert_eq!(left.id(), Some(FactId::new(7)));
        assert_eq!(range(left), (at("09:00"), Some(at("10:00"))));
        assert_eq!(right.id(), None);
        assert_eq!(right.split_from(), Some(FactId::new(7)));
        assert_eq!(range(right), (at("11:00"), Some(at("12:00"))));
    }

    #[test]
    fn short_split_pieces_are_dropped() {
        let min = TimeDelta::minutes(15);
        let edits = plan_conflicts(
            &new_fact("09:10", Some("11:00")),
            vec![record(7, "09:00", Some("12:00"))],
            min,
        );
        let [ConflictEdit::Trim { fact }] = edits.as_slice() else {
            panic!("expected one trim, got {edits:?}");
        };
        assert_eq!(range(fact), (at("11:00"), Some(at("12:00"))));

        let edits = plan_conflicts(
            &new_fact("09:10", Some("11:50")),
            vec![record(7, "09:00", Some("12:00"))],
            min,
        );
        assert!(matches!(edits.as_slice(), [ConflictEdit::Delete { .. }]));
    }

    #[test]
    fn ignores_disjoint_and_own_facts() {
        let fact = new_fact("09:00", Some("10:00")).with_id(FactId::new(3));
        let edits = plan_conflicts(
            &fact,
            vec![record(3, "09:00", Some("10:00")), record(4, "10:00", Some("11:00"))],
            TimeDelta::zero(),
        );
        assert!(edits.is_empty());
    }
}
