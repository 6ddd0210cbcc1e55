//! Time hints: what the caller expects a factoid to specify.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-declared expectation about which endpoints a factoid specifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeHint {
    /// Start and end are both required.
    VerifyBoth,
    /// Start is required; the fact stays open.
    VerifyStart,
    /// A single token closes the ongoing fact.
    VerifyEnd,
    /// Either endpoint may be omitted.
    #[default]
    VerifyNone,
    /// At most a start; the fact stays open.
    VerifyNotBoth,
    /// Like `VerifyNone`, but the start may not lie in the past.
    VerifyAfterNow,
}

impl TimeHint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VerifyBoth => "verify_both",
            Self::VerifyStart => "verify_start",
            Self::VerifyEnd => "verify_end",
            Self::VerifyNone => "verify_none",
            Self::VerifyNotBoth => "verify_not_both",
            Self::VerifyAfterNow => "verify_after_now",
        }
    }
}

impl fmt::Display for TimeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown hint string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown time hint: {0}")]
pub struct UnknownTimeHint(pub String);

impl FromStr for TimeHint {
    type Err = UnknownTimeHint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "verify_both" | "both" | "from" | "between" => Ok(Self::VerifyBoth),
            "verify_start" | "start" | "at" => Ok(Self::VerifyStart),
            "verify_end" | "end" | "to" | "until" => Ok(Self::VerifyEnd),
            "verify_none" | "none" | "on" | "now" => Ok(Self::VerifyNone),
            "verify_not_both" | "not_both" => Ok(Self::VerifyNotBoth),
            "verify_after_now" | "after_now" => Ok(Self::VerifyAfterNow),
            _ => Err(UnknownTimeHint(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names() {
        for hint in [
            TimeHint::VerifyBoth,
            TimeHint::VerifyStart,
            TimeHint::VerifyEnd,
            TimeHint::VerifyNone,
            TimeHint::VerifyNotBoth,
            TimeHint::VerifyAfterNow,
        ] {
            assert_eq!(hint.to_string().parse::<TimeHint>().unwrap(), hint);
        }
    }

    #[test]
    fn parses_command_aliases() {
        assert_eq!("on".parse::<TimeHint>().unwrap(), TimeHint::VerifyNone);
        assert_eq!("now".parse::<TimeHint>().unwrap(), TimeHint::VerifyNone);
        assert_eq!("at".parse::<TimeHint>().unwrap(), TimeHint::VerifyStart);
        assert_eq!("until".parse::<TimeHint>().unwrap(), TimeHint::VerifyEnd);
        assert_eq!("between".parse::<TimeHint>().unwrap(), TimeHint::VerifyBoth);
        assert_eq!(
            "verify-after-now".parse::<TimeHint>().unwrap(),
            TimeHint::VerifyAfterNow
        );
    }

    #[test]
    fn rejects_unknown() {
        let err = "sometimes".parse::<TimeHint>().unwrap_err();
        assert_eq!(err.to_string(), "unknown time hint: sometimes");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TimeHint::VerifyNotBoth).unwrap();
        assert_eq!(json, "\"verify_not_both\"");
    }
}
