//! Fact operations: parsing, validation and persistence wired together.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::conflict::{ConflictEdit, plan_conflicts};
use crate::entity_resolver::{EntityResolver, materialize};
use crate::error::{Error, Result};
use crate::fact::{Candidate, Fact};
use crate::hint::TimeHint;
use crate::parser::{parse_body, parse_factoid};
use crate::store::{Datastore, EntityKind, StoreError};
use crate::time_resolver::{TimeContext, resolve_times};
use crate::types::FactId;
use crate::validator::{FactValidator, check_range};
use crate::warning::Warning;

/// A validated fact and the notes gathered while building it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub fact: Fact,
    pub warnings: Vec<Warning>,
}

/// A candidate built from a factoid, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub candidate: Candidate,
    pub warnings: Vec<Warning>,
}

/// The outcome of a forced save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forced {
    pub fact: Fact,
    /// Changes made to other facts to make room.
    pub edits: Vec<ConflictEdit>,
    pub warnings: Vec<Warning>,
}

/// The current time, truncated to whole seconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Entry point for every fact operation.
///
/// Every method that writes runs its checks and writes inside one datastore
/// transaction. The `*_at` variants take the current time explicitly; the
/// others read the system clock.
#[derive(Debug)]
pub struct FactManager<S> {
    store: S,
    config: EngineConfig,
}

impl<S: Datastore> FactManager<S> {
    pub const fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// A validator over this manager's store.
    pub fn validator(&self, now: DateTime<Utc>) -> FactValidator<'_, S> {
        FactValidator::new(&self.store, self.config, now.trunc_subsecs(0))
    }

    // ========== Factoids ==========

    /// Parses and validates a factoid without storing anything.
    pub fn create_from_factoid(&self, raw: &str, hint: TimeHint) -> Result<Created> {
        self.create_from_factoid_at(raw, hint, now())
    }

    pub fn create_from_factoid_at(
        &self,
        raw: &str,
        hint: TimeHint,
        now: DateTime<Utc>,
    ) -> Result<Created> {
        let now = now.trunc_subsecs(0);
        create(&self.store, self.config, raw, hint, now)
    }

    /// Builds the candidate for a factoid, without validating it.
    pub fn prepare_from_factoid_at(
        &self,
        raw: &str,
        hint: TimeHint,
        now: DateTime<Utc>,
    ) -> Result<Prepared> {
        prepare(&self.store, self.config, raw, hint, now.trunc_subsecs(0))
    }

    /// Parses, validates and stores a factoid in one transaction.
    pub fn add_from_factoid(&mut self, raw: &str, hint: TimeHint) -> Result<Created> {
        self.add_from_factoid_at(raw, hint, now())
    }

    pub fn add_from_factoid_at(
        &mut self,
        raw: &str,
        hint: TimeHint,
        now: DateTime<Utc>,
    ) -> Result<Created> {
        let now = now.trunc_subsecs(0);
        let config = self.config;
        self.store.run_in_transaction(|store| {
            let Created { fact, warnings } = create(store, config, raw, hint, now)?;
            let fact = persist(store, fact)?;
            Ok(Created { fact, warnings })
        })
    }

    // ========== Saving ==========

    /// Re-validates and stores a fact, creating any new entities it uses.
    ///
    /// A fact with an id replaces the stored fact with that id.
    pub fn save(&mut self, fact: Fact) -> Result<Fact> {
        self.save_at(fact, now())
    }

    pub fn save_at(&mut self, fact: Fact, now: DateTime<Utc>) -> Result<Fact> {
        let now = now.trunc_subsecs(0);
        let config = self.config;
        self.store.run_in_transaction(|store| {
            let fact = FactValidator::new(&*store, config, now).validate(fact.into_candidate())?;
            persist(store, fact)
        })
    }

    /// The edits a forced save of `fact` would make to other facts.
    pub fn plan_conflicts(&self, fact: &Fact) -> Result<Vec<ConflictEdit>> {
        let stored = self
            .store
            .facts_overlapping(fact.start(), fact.end(), fact.id())?;
        Ok(plan_conflicts(fact, stored, self.config.min_delta()))
    }

    /// Stores a fact after trimming, splitting, stopping or deleting the
    /// facts it overlaps.
    pub fn save_forcefully(&mut self, fact: Fact) -> Result<Forced> {
        self.save_forcefully_at(fact, now())
    }

    pub fn save_forcefully_at(&mut self, fact: Fact, now: DateTime<Utc>) -> Result<Forced> {
        let now = now.trunc_subsecs(0);
        let config = self.config;
        self.store.run_in_transaction(|store| {
            force(store, config, fact.into_candidate(), Vec::new(), now)
        })
    }

    /// Parses a factoid and stores it forcefully, in one transaction.
    pub fn add_from_factoid_forcefully(&mut self, raw: &str, hint: TimeHint) -> Result<Forced> {
        self.add_from_factoid_forcefully_at(raw, hint, now())
    }

    pub fn add_from_factoid_forcefully_at(
        &mut self,
        raw: &str,
        hint: TimeHint,
        now: DateTime<Utc>,
    ) -> Result<Forced> {
        let now = now.trunc_subsecs(0);
        let config = self.config;
        self.store.run_in_transaction(|store| {
            let Prepared {
                candidate,
                warnings,
            } = prepare(store, config, raw, hint, now)?;
            force(store, config, candidate, warnings, now)
        })
    }

    // ========== Lookup and removal ==========

    /// The fact stored under `id`, deleted or not.
    pub fn get(&self, id: FactId) -> Result<Fact> {
        let record = self.store.get_fact(id)?.ok_or_else(|| fact_not_found(id))?;
        Ok(Fact::from_record(record))
    }

    /// Removes a stored fact and returns it, marked deleted.
    ///
    /// Without `purge` the fact stays in the store flagged as deleted, and
    /// removing it again changes nothing. With `purge` it is dropped from
    /// the store along with its tag links.
    pub fn remove(&mut self, id: FactId, purge: bool) -> Result<Fact> {
        self.store.run_in_transaction(|store| {
            let record = store.get_fact(id)?.ok_or_else(|| fact_not_found(id))?;
            let mut fact = Fact::from_record(record);
            if purge {
                store.delete_fact(id)?;
                fact.mark_deleted();
                tracing::info!(fact_id = %id, "purged fact");
            } else if !fact.is_deleted() {
                fact.mark_deleted();
                store.update_fact(&fact)?;
                tracing::info!(fact_id = %id, "deleted fact");
            }
            Ok(fact)
        })
    }

    // ========== Ongoing fact ==========

    /// The ongoing fact, if there is one.
    pub fn current(&self) -> Result<Option<Fact>> {
        Ok(self.store.ongoing_fact()?.map(Fact::from_record))
    }

    /// Starts a new ongoing fact.
    ///
    /// `activity` is the body of a factoid: `activity[@category]`, optionally
    /// followed by tags and a description. The start defaults to now.
    pub fn start_ongoing(&mut self, activity: &str, start: Option<DateTime<Utc>>) -> Result<Fact> {
        self.start_ongoing_at(activity, start, now())
    }

    pub fn start_ongoing_at(
        &mut self,
        activity: &str,
        start: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Fact> {
        let now = now.trunc_subsecs(0);
        let config = self.config;
        self.store.run_in_transaction(|store| {
            if let Some(ongoing) = store.ongoing_fact()? {
                return Err(Error::OngoingConflict {
                    id: ongoing.id,
                    start: ongoing.start,
                });
            }
            let body = parse_body(activity)?;
            let entities = EntityResolver::new(&*store, config.implicit_create).resolve(
                &body.activity,
                body.category.as_deref(),
                &body.tags,
            )?;
            let mut candidate = Candidate::new(
                entities.activity,
                start.map_or(now, |s| s.trunc_subsecs(0)),
            );
            candidate.tags = entities.tags;
            candidate.description = body.description;
            let fact = FactValidator::new(&*store, config, now).validate(candidate)?;
            let fact = persist(store, fact)?;
            tracing::info!(fact_id = ?fact.id(), start = %fact.start(), "started ongoing fact");
            Ok(fact)
        })
    }

    /// Closes the ongoing fact. The end defaults to now.
    pub fn stop_ongoing(&mut self, end: Option<DateTime<Utc>>) -> Result<Fact> {
        self.stop_ongoing_at(end, now())
    }

    pub fn stop_ongoing_at(
        &mut self,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Fact> {
        let now = now.trunc_subsecs(0);
        let config = self.config;
        self.store.run_in_transaction(|store| {
            let ongoing = store.ongoing_fact()?.ok_or(Error::NoOngoingFact)?;
            let mut candidate = Fact::from_record(ongoing).into_candidate();
            candidate.end = Some(end.map_or(now, |e| e.trunc_subsecs(0)));
            let fact = FactValidator::new(&*store, config, now).validate(candidate)?;
            let fact = persist(store, fact)?;
            tracing::info!(fact_id = ?fact.id(), end = ?fact.end(), "stopped ongoing fact");
            Ok(fact)
        })
    }

    /// Marks the ongoing fact deleted and returns it.
    pub fn cancel_ongoing(&mut self) -> Result<Fact> {
        self.store.run_in_transaction(|store| {
            let ongoing = store.ongoing_fact()?.ok_or(Error::NoOngoingFact)?;
            let mut fact = Fact::from_record(ongoing);
            fact.mark_deleted();
            store.update_fact(&fact)?;
            tracing::info!(fact_id = ?fact.id(), "cancelled ongoing fact");
            Ok(fact)
        })
    }
}

const fn fact_not_found(id: FactId) -> StoreError {
    StoreError::NotFound {
        kind: EntityKind::Fact,
        id: id.get(),
    }
}

fn create<S: Datastore>(
    store: &S,
    config: EngineConfig,
    raw: &str,
    hint: TimeHint,
    now: DateTime<Utc>,
) -> Result<Created> {
    let Prepared {
        candidate,
        warnings,
    } = prepare(store, config, raw, hint, now)?;
    let fact = FactValidator::new(store, config, now).validate(candidate)?;
    Ok(Created { fact, warnings })
}

fn prepare<S: Datastore>(
    store: &S,
    config: EngineConfig,
    raw: &str,
    hint: TimeHint,
    now: DateTime<Utc>,
) -> Result<Prepared> {
    let parsed = parse_factoid(raw, hint)?;
    let ongoing = store.ongoing_fact()?.map(Fact::from_record);
    let ctx = TimeContext {
        now,
        zone: config.timezone,
        ongoing: ongoing.as_ref(),
    };
    let times = resolve_times(parsed.start, parsed.end, hint, &ctx)?;
    let entities = EntityResolver::new(store, config.implicit_create).resolve(
        &parsed.activity,
        parsed.category.as_deref(),
        &parsed.tags,
    )?;

    let mut candidate = Candidate {
        id: None,
        start: times.start,
        end: times.end,
        activity: entities.activity,
        tags: entities.tags,
        description: parsed.description,
        split_from: None,
    };
    if let (Some(closes), Some(ongoing)) = (times.closes, ongoing) {
        candidate = close_into(ongoing.into_candidate(), candidate);
        candidate.id = Some(closes);
    }

    let mut warnings = times.warnings;
    warnings.extend(entities.warnings);
    Ok(Prepared {
        candidate,
        warnings,
    })
}

/// Folds a closing factoid into the ongoing fact it ends.
fn close_into(ongoing: Candidate, closing: Candidate) -> Candidate {
    let mut tags = ongoing.tags;
    for tag in closing.tags {
        if !tags.iter().any(|t| t.name.key() == tag.name.key()) {
            tags.push(tag);
        }
    }
    let description = match (ongoing.description, closing.description) {
        (Some(before), Some(after)) => Some(format!("{before} {after}")),
        (before, after) => before.or(after),
    };
    Candidate {
        id: ongoing.id,
        start: ongoing.start,
        end: closing.end,
        activity: closing.activity,
        tags,
        description,
        split_from: ongoing.split_from,
    }
}

fn force<S: Datastore>(
    store: &mut S,
    config: EngineConfig,
    candidate: Candidate,
    warnings: Vec<Warning>,
    now: DateTime<Utc>,
) -> Result<Forced> {
    check_range(&candidate, &config)?;
    let stored = store.facts_overlapping(candidate.start, candidate.end, candidate.id)?;
    let planned = Fact::accept(candidate);
    let edits = plan_conflicts(&planned, stored, config.min_delta());
    for edit in &edits {
        apply_edit(store, edit)?;
    }
    let fact = FactValidator::new(&*store, config, now).validate(planned.into_candidate())?;
    let fact = persist(store, fact)?;
    tracing::info!(fact_id = ?fact.id(), edits = edits.len(), "saved fact forcefully");
    Ok(Forced {
        fact,
        edits,
        warnings,
    })
}

fn persist<S: Datastore>(store: &mut S, mut fact: Fact) -> Result<Fact> {
    materialize(store, &mut fact)?;
    if fact.id().is_some() {
        store.update_fact(&fact)?;
        tracing::info!(fact_id = ?fact.id(), "updated fact");
        Ok(fact)
    } else {
        let id = store.insert_fact(&fact)?;
        tracing::info!(fact_id = %id, start = %fact.start(), "inserted fact");
        Ok(fact.with_id(id))
    }
}

fn apply_edit<S: Datastore>(store: &mut S, edit: &ConflictEdit) -> Result<()> {
    match edit {
        ConflictEdit::Trim { fact }
        | ConflictEdit::Stop { fact }
        | ConflictEdit::Delete { fact } => {
            store.update_fact(fact)?;
        }
        ConflictEdit::Split { left, right } => {
            store.update_fact(left)?;
            store.insert_fact(right)?;
        }
    }
    tracing::debug!(?edit, "applied conflict edit");
    Ok(())
}
