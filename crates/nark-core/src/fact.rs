//! Facts: tracked time intervals.
//!
//! A fact goes through two stages. A [`Candidate`] is a plain record anyone
//! can build. A [`Fact`] can only come out of validation, or out of a
//! [`FactRecord`] read back from a datastore, so holding a `Fact` means its
//! time range and consistency checks have passed.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LocalZone;
use crate::entity::{Activity, Tag};
use crate::types::FactId;

const FACTOID_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// An unvalidated fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Option<FactId>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub activity: Activity,
    pub tags: Vec<Tag>,
    pub description: Option<String>,
    pub split_from: Option<FactId>,
}

impl Candidate {
    /// A new open candidate with no tags or description.
    pub const fn new(activity: Activity, start: DateTime<Utc>) -> Self {
        Self {
            id: None,
            start,
            end: None,
            activity,
            tags: Vec::new(),
            description: None,
            split_from: None,
        }
    }

    #[must_use]
    pub fn ending(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }
}

/// A fact as exchanged with a datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    pub id: FactId,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub activity: Activity,
    pub tags: Vec<Tag>,
    pub description: Option<String>,
    pub deleted: bool,
    pub split_from: Option<FactId>,
}

/// A validated fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    id: Option<FactId>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    activity: Activity,
    tags: Vec<Tag>,
    description: Option<String>,
    deleted: bool,
    split_from: Option<FactId>,
}

impl Fact {
    pub(crate) fn accept(candidate: Candidate) -> Self {
        let description = candidate
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Self {
            id: candidate.id,
            start: candidate.start,
            end: candidate.end,
            activity: candidate.activity,
            tags: candidate.tags,
            description,
            deleted: false,
            split_from: candidate.split_from,
        }
    }

    pub(crate) fn from_record(record: FactRecord) -> Self {
        Self {
            id: Some(record.id),
            start: record.start,
            end: record.end,
            activity: record.activity,
            tags: record.tags,
            description: record.description,
            deleted: record.deleted,
            split_from: record.split_from,
        }
    }

    pub const fn id(&self) -> Option<FactId> {
        self.id
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub const fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub const fn split_from(&self) -> Option<FactId> {
        self.split_from
    }

    pub const fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }

    /// Length of a closed fact.
    pub fn duration(&self) -> Option<TimeDelta> {
        self.end.map(|end| end - self.start)
    }

    /// Returns the fact as an editable candidate.
    pub fn into_candidate(self) -> Candidate {
        Candidate {
            id: self.id,
            start: self.start,
            end: self.end,
            activity: self.activity,
            tags: self.tags,
            description: self.description,
            split_from: self.split_from,
        }
    }

    pub(crate) fn with_id(mut self, id: FactId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn set_start(&mut self, start: DateTime<Utc>) {
        self.start = start;
    }

    pub(crate) fn set_end(&mut self, end: DateTime<Utc>) {
        self.end = Some(end);
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub(crate) fn detach_as_split(&mut self) {
        self.split_from = self.id.take();
    }

    pub(crate) fn set_activity(&mut self, activity: Activity) {
        self.activity = activity;
    }

    pub(crate) fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = tags;
    }

    /// Compares content, ignoring storage ids and tag order.
    pub fn equivalent(&self, other: &Self) -> bool {
        let tag_keys = |fact: &Self| {
            let mut keys: Vec<String> = fact.tags.iter().map(|t| t.name.key()).collect();
            keys.sort();
            keys
        };
        self.start == other.start
            && self.end == other.end
            && self.activity.name.key() == other.activity.name.key()
            && self.activity.category.as_ref().map(|c| c.name.key())
                == other.activity.category.as_ref().map(|c| c.name.key())
            && tag_keys(self) == tag_keys(other)
            && self.description == other.description
    }

    /// Formats the fact as a factoid that parses back to the same fact.
    ///
    /// Closed facts read back with `verify_both`, open ones with
    /// `verify_start`. A description starting with `#` or `\\` gets a
    /// leading backslash so it is not read as a tag.
    pub fn to_factoid(&self, zone: LocalZone) -> String {
        let mut out = zone.to_fixed(self.start).format(FACTOID_TIME_FORMAT).to_string();
        if let Some(end) = self.end {
            out.push_str(" to ");
            out.push_str(&zone.to_fixed(end).format(FACTOID_TIME_FORMAT).to_string());
        }
        out.push_str(": ");
        out.push_str(&self.activity.qualified_name());
        for tag in &self.tags {
            out.push_str(": #");
            out.push_str(tag.name.as_str());
        }
        if let Some(description) = &self.description {
            out.push_str(": ");
            if description.starts_with(['#', '\\']) {
                out.push('\\');
            }
            out.push_str(description);
        }
        out
    }
}
