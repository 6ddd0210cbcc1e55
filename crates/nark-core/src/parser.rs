//! Factoid parsing.
//!
//! A factoid has the shape
//!
//! ```text
//! <start>[ to <end>]: <activity>[@<category>][: #<tag>[: #<tag>...]][: <description>]
//! ```
//!
//! A clock written as bare digits, like `0800`, counts as a time only when a
//! `,`, `:` or range separator follows it.
//!
//! Items are separated by `,`, `:` or a newline directly following a
//! non-whitespace character and followed by whitespace or the end of input.
//! A description that would otherwise start with `#` is written with a
//! leading backslash, as is one starting with a backslash.
//! Parsing is pure: names are returned as written and resolved elsewhere.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;
use crate::hint::TimeHint;
use crate::timespec::{TimeToken, lex_time};

/// The pieces of a factoid, before any lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFactoid {
    pub start: Option<TimeToken>,
    pub end: Option<TimeToken>,
    pub activity: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

/// Everything after the time prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Body {
    pub activity: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

static RANGE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:to|until|-)\s+").expect("range regex is valid"));

/// Parses a factoid, checking the time prefix against `hint`.
pub fn parse_factoid(raw: &str, hint: TimeHint) -> Result<ParsedFactoid, ParseError> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    let (first, second, body) = split_times(input, hint)?;
    let prefix = input[..input.len() - body.len()].trim().to_string();

    let (start, end) = match hint {
        TimeHint::VerifyBoth => match (first, second) {
            (Some(start), Some(end)) => (Some(start), Some(end)),
            (None, _) => return Err(ParseError::MissingStart { hint }),
            (Some(_), None) => return Err(ParseError::MissingEnd { hint }),
        },
        TimeHint::VerifyStart => match (first, second) {
            (Some(start), None) => (Some(start), None),
            (None, _) => return Err(ParseError::MissingStart { hint }),
            (Some(_), Some(_)) => {
                return Err(ParseError::UnexpectedEnd {
                    hint,
                    segment: prefix,
                });
            }
        },
        TimeHint::VerifyEnd => match (first, second) {
            (Some(end), None) => (None, Some(end)),
            (None, _) => return Err(ParseError::MissingEnd { hint }),
            (Some(_), Some(_)) => {
                return Err(ParseError::UnexpectedRange {
                    hint,
                    segment: prefix,
                });
            }
        },
        TimeHint::VerifyNotBoth => {
            if second.is_some() {
                return Err(ParseError::UnexpectedRange {
                    hint,
                    segment: prefix,
                });
            }
            (first, None)
        }
        TimeHint::VerifyNone | TimeHint::VerifyAfterNow => (first, second),
    };

    let body = parse_body(body)?;
    tracing::debug!(
        %hint,
        ?start,
        ?end,
        activity = %body.activity,
        category = ?body.category,
        tags = ?body.tags,
        "parsed factoid"
    );
    Ok(ParsedFactoid {
        start,
        end,
        activity: body.activity,
        category: body.category,
        tags: body.tags,
        description: body.description,
    })
}

type TimePrefix<'a> = (Option<TimeToken>, Option<TimeToken>, &'a str);

fn split_times(input: &str, hint: TimeHint) -> Result<TimePrefix<'_>, ParseError> {
    let Some(first) = lex_time(input)? else {
        return Ok((None, None, input));
    };
    if first.separated {
        return Ok((Some(first.token), None, first.rest));
    }
    let Some(sep) = RANGE_SEPARATOR.find(first.rest) else {
        // A number like `2019` only reads as a clock when a separator or a
        // range follows it.
        if first.bare_digits {
            return Ok((None, None, input));
        }
        return Ok((Some(first.token), None, first.rest));
    };
    match lex_time(&first.rest[sep.end()..])? {
        Some(second) => Ok((Some(first.token), Some(second.token), second.rest)),
        None => Err(ParseError::MissingEnd { hint }),
    }
}

/// Parses `activity[@category][ #tags][: #tags...][: description]`.
pub(crate) fn parse_body(text: &str) -> Result<Body, ParseError> {
    let text = text.trim();
    let (clause, rest) = split_segment(text);
    let clause = clause.trim();

    let mut tags = Vec::new();
    let main = match tag_start(clause) {
        Some(idx) => {
            push_tags(&clause[idx..], &mut tags);
            &clause[..idx]
        }
        None => clause,
    };
    let (activity, category) = match main.split_once('@') {
        Some((activity, category)) => (activity.trim(), Some(category.trim())),
        None => (main.trim(), None),
    };
    if activity.is_empty() {
        return Err(ParseError::MissingActivity {
            segment: clause.to_string(),
        });
    }
    let category = category.filter(|c| !c.is_empty()).map(str::to_string);

    let mut description = None;
    let mut remaining = rest.trim_start();
    while !remaining.is_empty() {
        if !remaining.starts_with('#') {
            description = Some(unescape_description(remaining.trim_end()).to_string());
            break;
        }
        let (segment, next) = split_segment(remaining);
        push_tags(segment, &mut tags);
        remaining = next.trim_start();
    }

    Ok(Body {
        activity: activity.to_string(),
        category,
        tags,
        description,
    })
}

fn unescape_description(text: &str) -> &str {
    match text.strip_prefix('\\') {
        Some(rest) if rest.starts_with(['#', '\\']) => rest,
        _ => text,
    }
}

/// Splits off the first item, returning it and the text after its separator.
pub(crate) fn split_segment(text: &str) -> (&str, &str) {
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, ',' | ':' | '\n')
            && prev.is_some_and(|p| !p.is_whitespace())
            && chars.peek().is_none_or(|(_, next)| next.is_whitespace())
        {
            return (&text[..idx], &text[idx + c.len_utf8()..]);
        }
        prev = Some(c);
    }
    (text, "")
}

/// Returns true if `text` contains a separator the parser would split on.
pub(crate) fn has_separator(text: &str) -> bool {
    split_segment(text).0.len() != text.len()
}

/// Byte offset of the first `#` that starts a word.
pub(crate) fn tag_start(text: &str) -> Option<usize> {
    let mut prev_is_space = true;
    for (idx, c) in text.char_indices() {
        if c == '#' && prev_is_space {
            return Some(idx);
        }
        prev_is_space = c.is_whitespace();
    }
    None
}

fn push_tags(text: &str, tags: &mut Vec<String>) {
    let mut remaining = text;
    while let Some(idx) = tag_start(remaining) {
        let after = &remaining[idx + 1..];
        let end = tag_start(after).unwrap_or(after.len());
        let name = after[..end].trim();
        if !name.is_empty() {
            let key = name.to_lowercase();
            if !tags.iter().any(|t| t.to_lowercase() == key) {
                tags.push(name.to_string());
            }
        }
        remaining = &after[end..];
    }
}
