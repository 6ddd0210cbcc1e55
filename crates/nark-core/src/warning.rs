//! Non-fatal notes produced alongside a successful result.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::FactId;

/// Which end of a fact a note refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Start,
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::End => f.write_str("end"),
        }
    }
}

/// Something the caller may want to surface but that did not stop the
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// No start was given, so now was used.
    StartDefaultedToNow,
    /// A bare clock time took its date from elsewhere.
    DateInherited { endpoint: Endpoint, date: NaiveDate },
    /// A bare clock end fell before the start and was moved to the next day.
    EndRolledOver,
    /// The factoid closes the ongoing fact rather than adding a new one.
    ClosesOngoing { id: FactId },
    NewCategory { name: String },
    NewActivity { name: String },
    NewTag { name: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartDefaultedToNow => write!(f, "no start given, using now"),
            Self::DateInherited { endpoint, date } => {
                write!(f, "{endpoint} time has no date, using {date}")
            }
            Self::EndRolledOver => write!(f, "end is before start, moved to the next day"),
            Self::ClosesOngoing { id } => write!(f, "closes ongoing fact {id}"),
            Self::NewCategory { name } => write!(f, "new category: {name}"),
            Self::NewActivity { name } => write!(f, "new activity: {name}"),
            Self::NewTag { name } => write!(f, "new tag: {name}"),
        }
    }
}
