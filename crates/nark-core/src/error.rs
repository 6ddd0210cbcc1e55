//! Error types returned by the engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::hint::TimeHint;
use crate::store::StoreError;
use crate::types::{FactId, ValidationError};

/// A factoid that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("factoid is empty")]
    Empty,

    #[error("{hint} expects a start time")]
    MissingStart { hint: TimeHint },

    #[error("{hint} expects an end time")]
    MissingEnd { hint: TimeHint },

    /// An end was given where only a start makes sense.
    #[error("{hint} expects a start time only, found an end time: {segment:?}")]
    UnexpectedEnd { hint: TimeHint, segment: String },

    /// A start and an end were given where a single time makes sense.
    #[error("{hint} expects a single time, found a range: {segment:?}")]
    UnexpectedRange { hint: TimeHint, segment: String },

    #[error("invalid time {raw:?}: {reason}")]
    InvalidTime { raw: String, reason: String },

    #[error("missing activity in {segment:?}")]
    MissingActivity { segment: String },
}

/// A time range that breaks an ordering or duration rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeRangeError {
    #[error("end {end} is not after start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("fact lasts {actual}s, shorter than the minimum of {minimum}s")]
    TooShort { actual: i64, minimum: i64 },

    #[error("start {start} lies before now ({now})")]
    StartInPast {
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

/// Errors from factoid handling and fact persistence.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    /// Another fact is already ongoing.
    #[error("fact {id} is already ongoing since {start}")]
    OngoingConflict { id: FactId, start: DateTime<Utc> },

    /// The fact overlaps a stored fact on `[start, end)`.
    #[error("overlaps fact {fact_id} from {start} to {end}")]
    Overlap {
        fact_id: FactId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no ongoing fact")]
    NoOngoingFact,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Convenience alias for results with the engine [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
