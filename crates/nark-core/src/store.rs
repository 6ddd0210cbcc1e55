//! The storage seam.
//!
//! The engine never decides how facts are stored. Everything it reads or
//! writes goes through a [`Datastore`], and every check-then-write sequence
//! runs inside [`Datastore::run_in_transaction`].

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entity::{Activity, Category, Tag};
use crate::fact::{Fact, FactRecord};
use crate::types::FactId;

/// Kinds of stored entities, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Category,
    Activity,
    Tag,
    Fact,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Category => "category",
            Self::Activity => "activity",
            Self::Tag => "tag",
            Self::Fact => "fact",
        };
        f.write_str(s)
    }
}

/// Datastore failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entity with the same identity already exists.
    #[error("{kind} {name:?} already exists")]
    Duplicate { kind: EntityKind, name: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    /// A fact references an entity that has not been persisted.
    #[error("{kind} {name:?} has not been saved")]
    Unsaved { kind: EntityKind, name: String },

    /// The backend refused a write that breaks one of its constraints.
    #[error("constraint violated: {reason}")]
    Constraint { reason: String },

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for categories, activities, tags and facts.
///
/// Name lookups are case-insensitive. Deleted entities are still returned by
/// lookups; deleted facts are not.
pub trait Datastore {
    fn find_category(&self, name: &str) -> StoreResult<Option<Category>>;

    /// Finds the activity named `name` in the given category scope, where
    /// `None` is the uncategorized scope.
    fn find_activity(&self, name: &str, category: Option<&str>) -> StoreResult<Option<Activity>>;

    /// All activities with this name, in any category scope.
    fn activities_named(&self, name: &str) -> StoreResult<Vec<Activity>>;

    fn find_tag(&self, name: &str) -> StoreResult<Option<Tag>>;

    /// Stores a new category and returns it with its id.
    fn create_category(&mut self, category: &Category) -> StoreResult<Category>;

    /// Stores a new activity. Its category, if any, must already be stored.
    fn create_activity(&mut self, activity: &Activity) -> StoreResult<Activity>;

    fn create_tag(&mut self, tag: &Tag) -> StoreResult<Tag>;

    /// Non-deleted facts whose range intersects `[start, end)`.
    ///
    /// `end: None` leaves the query unbounded. Ongoing facts are treated as
    /// unbounded too; callers clip them to their own notion of now.
    fn facts_overlapping(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        exclude: Option<FactId>,
    ) -> StoreResult<Vec<FactRecord>>;

    /// The non-deleted fact without an end, if any.
    fn ongoing_fact(&self) -> StoreResult<Option<FactRecord>>;

    fn get_fact(&self, id: FactId) -> StoreResult<Option<FactRecord>>;

    /// Stores a new fact. Its activity, category and tags must be stored.
    fn insert_fact(&mut self, fact: &Fact) -> StoreResult<FactId>;

    /// Overwrites the stored fact with the same id.
    fn update_fact(&mut self, fact: &Fact) -> StoreResult<()>;

    /// Removes a fact and its tag links for good. Facts split from it keep
    /// their data but lose the link.
    fn delete_fact(&mut self, id: FactId) -> StoreResult<()>;

    /// Runs `f` atomically: its writes are committed when it returns `Ok`
    /// and discarded when it returns `Err`.
    fn run_in_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>;
}
