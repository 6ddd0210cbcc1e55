//! Resolution of time tokens into instants.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};

use crate::config::LocalZone;
use crate::error::{Error, ParseError, TimeRangeError};
use crate::fact::Fact;
use crate::hint::TimeHint;
use crate::timespec::TimeToken;
use crate::types::FactId;
use crate::warning::{Endpoint, Warning};

/// The clock and state a resolution runs against.
#[derive(Debug, Clone, Copy)]
pub struct TimeContext<'a> {
    pub now: DateTime<Utc>,
    pub zone: LocalZone,
    /// The currently open fact, if any.
    pub ongoing: Option<&'a Fact>,
}

/// Concrete start and end for a candidate fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTimes {
    pub start: DateTime<Utc>,
    /// `None` leaves the fact open.
    pub end: Option<DateTime<Utc>>,
    /// The open fact this range closes, for `verify_end`.
    pub closes: Option<FactId>,
    pub warnings: Vec<Warning>,
}

/// Resolves parsed time tokens under `hint`.
///
/// A bare clock time takes its date from the other endpoint when that one
/// has a date, and from today in the configured zone otherwise. A bare clock
/// end that lands before the start is moved to the following day, once.
pub fn resolve_times(
    start: Option<TimeToken>,
    end: Option<TimeToken>,
    hint: TimeHint,
    ctx: &TimeContext<'_>,
) -> Result<ResolvedTimes, Error> {
    let mut warnings = Vec::new();
    let mut closes = None;

    let (start, fixed_start, end) = match hint {
        TimeHint::VerifyBoth => (
            Some(start.ok_or(ParseError::MissingStart { hint })?),
            None,
            Some(end.ok_or(ParseError::MissingEnd { hint })?),
        ),
        TimeHint::VerifyStart | TimeHint::VerifyNotBoth => {
            if end.is_some() {
                return Err(ParseError::UnexpectedEnd {
                    hint,
                    segment: String::new(),
                }
                .into());
            }
            let start = match (hint, start) {
                (_, Some(start)) => start,
                (TimeHint::VerifyStart, None) => {
                    return Err(ParseError::MissingStart { hint }.into());
                }
                (_, None) => {
                    warnings.push(Warning::StartDefaultedToNow);
                    TimeToken::Now
                }
            };
            (Some(start), None, None)
        }
        TimeHint::VerifyEnd => {
            let ongoing = ctx.ongoing.ok_or(Error::NoOngoingFact)?;
            closes = ongoing.id();
            if let Some(id) = closes {
                warnings.push(Warning::ClosesOngoing { id });
            }
            let end = end.or(start).ok_or(ParseError::MissingEnd { hint })?;
            (None, Some(ongoing.start()), Some(end))
        }
        TimeHint::VerifyNone | TimeHint::VerifyAfterNow => {
            let start = start.unwrap_or_else(|| {
                warnings.push(Warning::StartDefaultedToNow);
                TimeToken::Now
            });
            (Some(start), None, end)
        }
    };

    let start_is_clock = start.is_some_and(|t| t.is_clock());
    let end_is_clock = end.is_some_and(|t| t.is_clock());

    let (start_at, end_at) = if start_is_clock && end.is_some() && !end_is_clock {
        let (end_at, _) = resolve_token(end, None, ctx)?;
        let (start_at, inherited) = resolve_token(start, end_at, ctx)?;
        if let Some(date) = inherited {
            warnings.push(Warning::DateInherited {
                endpoint: Endpoint::Start,
                date,
            });
        }
        (start_at, end_at)
    } else {
        let (start_at, inherited) = match fixed_start {
            Some(fixed) => (Some(fixed), None),
            None => resolve_token(start, None, ctx)?,
        };
        if let Some(date) = inherited {
            warnings.push(Warning::DateInherited {
                endpoint: Endpoint::Start,
                date,
            });
        }
        let (mut end_at, inherited) = resolve_token(end, start_at, ctx)?;
        if let (Some(date), Some(end_time), Some(start_at), Some(TimeToken::Clock(clock))) =
            (inherited, end_at, start_at, end)
        {
            warnings.push(Warning::DateInherited {
                endpoint: Endpoint::End,
                date,
            });
            if end_time < start_at {
                if let Some(next_day) = date.succ_opt() {
                    end_at = Some(ctx.zone.to_utc(next_day.and_time(clock)));
                    warnings.push(Warning::EndRolledOver);
                }
            }
        }
        (start_at, end_at)
    };

    // Every hint leaves a start token or a fixed start.
    let Some(start_at) = start_at else {
        return Err(ParseError::MissingStart { hint }.into());
    };

    if hint == TimeHint::VerifyAfterNow && start_at < ctx.now {
        return Err(TimeRangeError::StartInPast {
            start: start_at,
            now: ctx.now,
        }
        .into());
    }

    tracing::debug!(%hint, start = %start_at, end = ?end_at, ?closes, "resolved times");
    Ok(ResolvedTimes {
        start: start_at,
        end: end_at,
        closes,
        warnings,
    })
}

/// Resolves a single token, returning the instant and the date a bare clock
/// time was placed on.
fn resolve_token(
    token: Option<TimeToken>,
    anchor: Option<DateTime<Utc>>,
    ctx: &TimeContext<'_>,
) -> Result<(Option<DateTime<Utc>>, Option<NaiveDate>), Error> {
    let Some(token) = token else {
        return Ok((None, None));
    };
    let zone = ctx.zone;
    let instant = match token {
        TimeToken::Now => ctx.now,
        TimeToken::Relative { minutes } => TimeDelta::try_minutes(minutes)
            .and_then(|delta| ctx.now.checked_add_signed(delta))
            .ok_or_else(|| ParseError::InvalidTime {
                raw: format!("{minutes:+}m"),
                reason: "relative time out of range".to_string(),
            })?,
        TimeToken::Date(date) => zone.to_utc(date.and_time(NaiveTime::MIN)),
        TimeToken::Naive(naive) => zone.to_utc(naive),
        TimeToken::Zoned(zoned) => zoned.with_timezone(&Utc),
        TimeToken::Clock(clock) => {
            let date = zone.today(anchor.unwrap_or(ctx.now));
            return Ok((Some(zone.to_utc(date.and_time(clock))), Some(date)));
        }
    };
    Ok((Some(instant), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Activity;
    use crate::fact::Candidate;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn clock(h: u32, m: u32) -> TimeToken {
        TimeToken::Clock(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn naive(s: &str) -> TimeToken {
        TimeToken::Naive(chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap())
    }

    fn ctx(now: &str) -> TimeContext<'static> {
        TimeContext {
            now: at(now),
            zone: LocalZone::Utc,
            ongoing: None,
        }
    }

    // ========== Date inheritance ==========

    #[test]
    fn clock_start_inherits_end_date() {
        let resolved = resolve_times(
            Some(clock(8, 0)),
            Some(naive("2019-02-16 10:00")),
            TimeHint::VerifyBoth,
            &ctx("2024-06-01T12:00:00Z"),
        )
        .unwrap();
        assert_eq!(resolved.start, at("2019-02-16T08:00:00Z"));
        assert_eq!(resolved.end, Some(at("2019-02-16T10:00:00Z")));
        assert!(resolved.warnings.contains(&Warning::DateInherited {
            endpoint: Endpoint::Start,
            date: NaiveDate::from_ymd_opt(2019, 2, 16).unwrap(),
        }));
    }

    #[test]
    fn clock_end_inherits_start_date() {
        let resolved = resolve_times(
            Some(naive("2019-02-16 08:00")),
            Some(clock(9, 30)),
            TimeHint::VerifyBoth,
            &ctx("2024-06-01T12:00:00Z"),
        )
        .unwrap();
        assert_eq!(resolved.end, Some(at("2019-02-16T09:30:00Z")));
    }

    #[test]
    fn clock_pair_uses_today() {
        let resolved = resolve_times(
            Some(clock(8, 0)),
            Some(clock(9, 0)),
            TimeHint::VerifyBoth,
            &ctx("2024-06-01T12:00:00Z"),
        )
        .unwrap();
        assert_eq!(resolved.start, at("2024-06-01T08:00:00Z"));
        assert_eq!(resolved.end, Some(at("2024-06-01T09:00:00Z")));
    }

    #[test]
    fn clock_start_after_dated_end_is_not_adjusted() {
        let resolved = resolve_times(
            Some(clock(11, 0)),
            Some(naive("2019-02-16 10:00")),
            TimeHint::VerifyBoth,
            &ctx("2024-06-01T12:00:00Z"),
        )
        .unwrap();
        assert_eq!(resolved.start, at("2019-02-16T11:00:00Z"));
        assert_eq!(resolved.end, Some(at("2019-02-16T10:00:00Z")));
    }

    // ========== Midnight ==========

    #[test]
    fn clock_end_before_start_rolls_over_once() {
        let resolved = resolve_times(
            Some(clock(22, 0)),
            Some(clock(1, 0)),
            TimeHint::VerifyBoth,
            &ctx("2024-06-01T23:00:00Z"),
        )
        .unwrap();
        assert_eq!(resolved.start, at("2024-06-01T22:00:00Z"));
        assert_eq!(resolved.end, Some(at("2024-06-02T01:00:00Z")));
        assert!(resolved.warnings.contains(&Warning::EndRolledOver));
    }

    #[test]
    fn dated_end_before_start_is_not_rolled_over() {
        let resolved = resolve_times(
            Some(naive("2019-02-16 22:00")),
            Some(naive("2019-02-16 01:00")),
            TimeHint::VerifyBoth,
            &ctx("2024-06-01T23:00:00Z"),
        )
        .unwrap();
        assert_eq!(resolved.end, Some(at("2019-02-16T01:00:00Z")));
        assert!(!resolved.warnings.contains(&Warning::EndRolledOver));
    }

    // ========== Hints ==========

    #[test]
    fn verify_none_without_tokens_starts_now() {
        let resolved =
            resolve_times(None, None, TimeHint::VerifyNone, &ctx("2024-06-01T12:00:00Z"))
                .unwrap();
        assert_eq!(resolved.start, at("2024-06-01T12:00:00Z"));
        assert_eq!(resolved.end, None);
        assert_eq!(resolved.warnings, vec![Warning::StartDefaultedToNow]);
    }

    #[test]
    fn relative_start_counts_from_now() {
        let resolved = resolve_times(
            Some(TimeToken::Relative { minutes: -90 }),
            None,
            TimeHint::VerifyNotBoth,
            &ctx("2024-06-01T12:00:00Z"),
        )
        .unwrap();
        assert_eq!(resolved.start, at("2024-06-01T10:30:00Z"));
    }

    #[test]
    fn verify_end_closes_ongoing_fact() {
        let activity = Activity::new("coding", None).unwrap();
        let ongoing = Fact::accept(Candidate::new(activity, at("2024-06-01T09:00:00Z")))
            .with_id(FactId::new(5));
        let context = TimeContext {
            ongoing: Some(&ongoing),
            ..ctx("2024-06-01T12:00:00Z")
        };
        let resolved = resolve_times(None, Some(clock(11, 0)), TimeHint::VerifyEnd, &context)
            .unwrap();
        assert_eq!(resolved.start, at("2024-06-01T09:00:00Z"));
        assert_eq!(resolved.end, Some(at("2024-06-01T11:00:00Z")));
        assert_eq!(resolved.closes, Some(FactId::new(5)));
    }

    #[test]
    fn verify_end_requires_ongoing_fact() {
        let err = resolve_times(
            None,
            Some(clock(11, 0)),
            TimeHint::VerifyEnd,
            &ctx("2024-06-01T12:00:00Z"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoOngoingFact));
    }

    #[test]
    fn verify_after_now_rejects_past_start() {
        let err = resolve_times(
            Some(TimeToken::Relative { minutes: -5 }),
            None,
            TimeHint::VerifyAfterNow,
            &ctx("2024-06-01T12:00:00Z"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::TimeRange(TimeRangeError::StartInPast { .. })
        ));
        assert!(
            resolve_times(
                Some(TimeToken::Relative { minutes: 30 }),
                None,
                TimeHint::VerifyAfterNow,
                &ctx("2024-06-01T12:00:00Z"),
            )
            .is_ok()
        );
    }

    #[test]
    fn naive_times_use_configured_zone() {
        let context = TimeContext {
            zone: "+02:00".parse().unwrap(),
            ..ctx("2024-06-01T12:00:00Z")
        };
        let resolved = resolve_times(
            Some(naive("2019-02-16 10:00")),
            None,
            TimeHint::VerifyStart,
            &context,
        )
        .unwrap();
        assert_eq!(resolved.start, at("2019-02-16T08:00:00Z"));
    }
}
