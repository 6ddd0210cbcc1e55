//! Core domain logic for nark.
//!
//! This crate turns free-form factoids into validated facts:
//! - Parsing: splitting a factoid into times, activity, tags and description
//! - Resolution: turning time tokens into instants and names into entities
//! - Validation: ordering, minimum duration, overlaps and the single ongoing fact
//!
//! Storage is left to a [`Datastore`] implementation.

pub mod config;
mod conflict;
pub mod entity;
mod entity_resolver;
pub mod error;
pub mod fact;
pub mod hint;
mod manager;
mod memory;
pub mod parser;
pub mod store;
pub mod time_resolver;
pub mod timespec;
pub mod types;
mod validator;
pub mod warning;

pub use config::{EngineConfig, InvalidZone, LocalZone};
pub use conflict::{ConflictEdit, plan_conflicts};
pub use entity::{Activity, Category, Tag};
pub use entity_resolver::{EntityResolver, ResolvedEntities};
pub use error::{Error, ParseError, Result, TimeRangeError};
pub use fact::{Candidate, Fact, FactRecord};
pub use hint::{TimeHint, UnknownTimeHint};
pub use manager::{Created, FactManager, Forced, Prepared, now};
pub use memory::MemoryStore;
pub use parser::{ParsedFactoid, parse_factoid};
pub use store::{Datastore, EntityKind, StoreError, StoreResult};
pub use time_resolver::{ResolvedTimes, TimeContext, resolve_times};
pub use timespec::{TimeToken, parse_time};
pub use types::{ActivityId, CategoryId, FactId, Name, TagId, ValidationError};
pub use validator::FactValidator;
pub use warning::{Endpoint, Warning};
