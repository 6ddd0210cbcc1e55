//! Engine configuration.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings consumed by the parser, resolvers and validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum duration of a closed fact, in seconds.
    pub fact_min_delta: u32,
    /// Zone used to interpret naive times in factoids.
    pub timezone: LocalZone,
    /// Create unknown categories, activities and tags on save.
    pub implicit_create: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fact_min_delta: 0,
            timezone: LocalZone::Local,
            implicit_create: true,
        }
    }
}

impl EngineConfig {
    pub fn min_delta(&self) -> TimeDelta {
        TimeDelta::seconds(i64::from(self.fact_min_delta))
    }
}

/// Error returned when a zone string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timezone {0:?}: expected \"local\", \"utc\" or an offset like \"+02:00\"")]
pub struct InvalidZone(pub String);

/// The zone naive factoid times are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LocalZone {
    /// The system's local zone, including its DST rules.
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl LocalZone {
    /// Interprets a wall-clock time in this zone.
    ///
    /// A time inside a DST gap is moved forward one hour; a time inside a
    /// fold resolves to the earlier instant.
    pub fn to_utc(self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Local => resolve_in(&Local, naive),
            Self::Utc => naive.and_utc(),
            Self::Fixed(offset) => resolve_in(&offset, naive),
        }
    }

    /// Converts an instant into this zone.
    pub fn to_fixed(self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Local => instant.with_timezone(&Local).fixed_offset(),
            Self::Utc => instant.fixed_offset(),
            Self::Fixed(offset) => instant.with_timezone(&offset),
        }
    }

    /// The calendar date of `now` in this zone.
    pub fn today(self, now: DateTime<Utc>) -> NaiveDate {
        self.to_fixed(now).date_naive()
    }
}

fn resolve_in<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + TimeDelta::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => shifted.and_utc(),
            }
        }
    }
}

/// Parses `Z`, `+HH`, `+HHMM` or `+HH:MM`.
pub(crate) fn parse_offset(raw: &str) -> Option<FixedOffset> {
    if raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl FromStr for LocalZone {
    type Err = InvalidZone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" | "z" => Ok(Self::Utc),
            _ => parse_offset(trimmed)
                .map(Self::Fixed)
                .ok_or_else(|| InvalidZone(s.to_string())),
        }
    }
}

impl TryFrom<String> for LocalZone {
    type Error = InvalidZone;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LocalZone> for String {
    fn from(zone: LocalZone) -> Self {
        zone.to_string()
    }
}

impl fmt::Display for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Utc => write!(f, "utc"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}
