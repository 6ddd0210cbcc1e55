//! Lexing of the time tokens that prefix a factoid.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use regex::Regex;

use crate::config::parse_offset;
use crate::error::ParseError;

/// A time expression as written, before resolution against a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeToken {
    /// The word `now`.
    Now,
    /// Minutes relative to now, e.g. `-30`, `+1h`, `-1h30m`.
    Relative { minutes: i64 },
    /// A bare clock time whose date is inferred.
    Clock(NaiveTime),
    /// A date without a time, meaning local midnight.
    Date(NaiveDate),
    /// A date and time in the configured zone.
    Naive(NaiveDateTime),
    /// A date and time with an explicit offset.
    Zoned(DateTime<FixedOffset>),
}

impl TimeToken {
    pub const fn is_clock(&self) -> bool {
        matches!(self, Self::Clock(_))
    }
}

/// A token lexed off the front of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lexed<'a> {
    pub token: TimeToken,
    /// Whether the token was directly followed by `,` or `:`.
    pub separated: bool,
    /// Whether the token is a clock written as bare digits, like `0800`.
    pub bare_digits: bool,
    /// Input following the token and its trailing whitespace.
    pub rest: &'a str,
}

static TIME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<token>",
        r"(?i:now)",
        r"|(?:\d{4}-\d{1,2}-\d{1,2}|\d{8})",
        r"(?:[ T]\d{1,2}:?\d{2}(?::?\d{2}(?:\.\d+)?)?(?:[Zz]|[+-]\d{2}(?::?\d{2})?)?)?",
        r"|\d{1,2}:?\d{2}(?::\d{2})?",
        r"|[-+](?:\d+h)?\d+m?",
        r"|[-+]?\d+h",
        r")(?P<sep>[,:]?)(?:\s+|$)",
    ))
    .expect("time token regex is valid")
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sign>[-+])?(?:(?P<hours>\d+)h)?(?:(?P<minutes>\d+)m?)?$")
        .expect("relative time regex is valid")
});

/// Lexes a time token at the start of `input`, if there is one.
///
/// Returns `Ok(None)` when `input` does not begin with something shaped like
/// a time, and an error when it does but the value is out of range. A bare
/// number that is no valid clock, like `2561`, is only an error when a
/// separator follows it.
pub(crate) fn lex_time(input: &str) -> Result<Option<Lexed<'_>>, ParseError> {
    let Some(caps) = TIME_TOKEN.captures(input) else {
        return Ok(None);
    };
    let (Some(whole), Some(raw)) = (caps.get(0), caps.name("token")) else {
        return Ok(None);
    };
    let raw = raw.as_str();
    let separated = caps.name("sep").is_some_and(|sep| !sep.as_str().is_empty());
    let bare_digits = raw.len() < 8 && raw.bytes().all(|b| b.is_ascii_digit());
    let token = match parse_time(raw) {
        Ok(token) => token,
        Err(_) if bare_digits && !separated => return Ok(None),
        Err(err) => return Err(err),
    };
    Ok(Some(Lexed {
        token,
        separated,
        bare_digits,
        rest: &input[whole.end()..],
    }))
}

/// Parses a single, complete time token.
pub fn parse_time(raw: &str) -> Result<TimeToken, ParseError> {
    let invalid = |reason: &str| ParseError::InvalidTime {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.eq_ignore_ascii_case("now") {
        return Ok(TimeToken::Now);
    }
    if raw.starts_with(['-', '+']) || raw.ends_with(['h', 'm']) {
        return parse_relative(raw).ok_or_else(|| invalid("not a relative time"));
    }

    let bytes = raw.as_bytes();
    let is_date = bytes.len() >= 8
        && (bytes.get(4) == Some(&b'-') || bytes[..8].iter().all(u8::is_ascii_digit));
    if !is_date {
        return parse_clock(raw)
            .map(TimeToken::Clock)
            .ok_or_else(|| invalid("not a valid clock time"));
    }

    let (date_part, time_part) = match raw.find([' ', 'T']) {
        Some(idx) => (&raw[..idx], Some(&raw[idx + 1..])),
        None => (raw, None),
    };
    let date = parse_date(date_part).ok_or_else(|| invalid("not a valid date"))?;
    let Some(time_part) = time_part else {
        return Ok(TimeToken::Date(date));
    };

    let (clock, zone) = match time_part.find(['Z', 'z', '+', '-']) {
        Some(idx) => (&time_part[..idx], Some(&time_part[idx..])),
        None => (time_part, None),
    };
    // Fractional seconds are dropped.
    let clock = clock.split('.').next().unwrap_or(clock);
    let time = parse_clock(clock).ok_or_else(|| invalid("not a valid clock time"))?;
    let naive = date.and_time(time);

    match zone {
        None => Ok(TimeToken::Naive(naive)),
        Some(zone) => {
            let offset = parse_offset(zone).ok_or_else(|| invalid("not a valid UTC offset"))?;
            offset
                .from_local_datetime(&naive)
                .single()
                .map(TimeToken::Zoned)
                .ok_or_else(|| invalid("not representable at this offset"))
        }
    }
}

fn parse_relative(raw: &str) -> Option<TimeToken> {
    let caps = RELATIVE.captures(raw)?;
    let hours = caps.name("hours");
    let minutes = caps.name("minutes");
    if hours.is_none() && minutes.is_none() {
        return None;
    }
    let mut total = 0_i64;
    if let Some(hours) = hours {
        total += hours.as_str().parse::<i64>().ok()?.checked_mul(60)?;
    }
    if let Some(minutes) = minutes {
        total = total.checked_add(minutes.as_str().parse::<i64>().ok()?)?;
    }
    if caps.name("sign").is_some_and(|s| s.as_str() == "-") {
        total = -total;
    }
    Some(TimeToken::Relative { minutes: total })
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let digits: String = raw.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| digits.get(range)?.parse::<u32>().ok();
    let (h, m, s) = match digits.len() {
        3 => (field(0..1)?, field(1..3)?, 0),
        4 => (field(0..2)?, field(2..4)?, 0),
        5 => (field(0..1)?, field(1..3)?, field(3..5)?),
        6 => (field(0..2)?, field(2..4)?, field(4..6)?),
        _ => return None,
    };
    NaiveTime::from_hms_opt(h, m, s)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let (y, m, d) = if raw.contains('-') {
        let mut parts = raw.split('-');
        let y = parts.next()?.parse().ok()?;
        let m = parts.next()?.parse().ok()?;
        let d = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        (y, m, d)
    } else {
        (
            raw.get(0..4)?.parse().ok()?,
            raw.get(4..6)?.parse().ok()?,
            raw.get(6..8)?.parse().ok()?,
        )
    };
    NaiveDate::from_ymd_opt(y, m, d)
}
