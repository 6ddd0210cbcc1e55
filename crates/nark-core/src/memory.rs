//! In-process datastore.

use chrono::{DateTime, Utc};

use crate::entity::{Activity, Category, Tag};
use crate::fact::{Fact, FactRecord};
use crate::store::{Datastore, EntityKind, StoreError, StoreResult};
use crate::types::{ActivityId, CategoryId, FactId, TagId};

/// A [`Datastore`] held entirely in memory.
///
/// Transactions snapshot the whole store and restore it on error.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    categories: Vec<Category>,
    activities: Vec<Activity>,
    tags: Vec<Tag>,
    facts: Vec<FactRecord>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All facts, including deleted ones, in insertion order.
    pub fn facts(&self) -> &[FactRecord] {
        &self.facts
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_references(fact: &Fact) -> StoreResult<()> {
        let activity = fact.activity();
        if activity.id.is_none() {
            return Err(StoreError::Unsaved {
                kind: EntityKind::Activity,
                name: activity.name.to_string(),
            });
        }
        if let Some(category) = activity.category.as_ref().filter(|c| c.id.is_none()) {
            return Err(StoreError::Unsaved {
                kind: EntityKind::Category,
                name: category.name.to_string(),
            });
        }
        if let Some(tag) = fact.tags().iter().find(|t| t.id.is_none()) {
            return Err(StoreError::Unsaved {
                kind: EntityKind::Tag,
                name: tag.name.to_string(),
            });
        }
        Ok(())
    }

    fn check_single_ongoing(&self, fact: &Fact) -> StoreResult<()> {
        if fact.is_ongoing() && !fact.is_deleted() {
            let other = self
                .facts
                .iter()
                .find(|r| !r.deleted && r.end.is_none() && Some(r.id) != fact.id());
            if let Some(other) = other {
                return Err(StoreError::Constraint {
                    reason: format!("fact {} is already ongoing", other.id),
                });
            }
        }
        Ok(())
    }
}

fn to_record(id: FactId, fact: &Fact) -> FactRecord {
    FactRecord {
        id,
        start: fact.start(),
        end: fact.end(),
        activity: fact.activity().clone(),
        tags: fact.tags().to_vec(),
        description: fact.description().map(str::to_string),
        deleted: fact.is_deleted(),
        split_from: fact.split_from(),
    }
}

impl Datastore for MemoryStore {
    fn find_category(&self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self.categories.iter().find(|c| c.name.matches(name)).cloned())
    }

    fn find_activity(&self, name: &str, category: Option<&str>) -> StoreResult<Option<Activity>> {
        Ok(self
            .activities
            .iter()
            .find(|a| a.is_named(name, category))
            .cloned())
    }

    fn activities_named(&self, name: &str) -> StoreResult<Vec<Activity>> {
        Ok(self
            .activities
            .iter()
            .filter(|a| a.name.matches(name))
            .cloned()
            .collect())
    }

    fn find_tag(&self, name: &str) -> StoreResult<Option<Tag>> {
        Ok(self.tags.iter().find(|t| t.name.matches(name)).cloned())
    }

    fn create_category(&mut self, category: &Category) -> StoreResult<Category> {
        if self.find_category(category.name.as_str())?.is_some() {
            return Err(StoreError::Duplicate {
                kind: EntityKind::Category,
                name: category.name.to_string(),
            });
        }
        let stored = category
            .clone()
            .with_id(CategoryId::new(self.allocate_id()));
        self.categories.push(stored.clone());
        Ok(stored)
    }

    fn create_activity(&mut self, activity: &Activity) -> StoreResult<Activity> {
        if let Some(category) = activity.category.as_ref().filter(|c| c.id.is_none()) {
            return Err(StoreError::Unsaved {
                kind: EntityKind::Category,
                name: category.name.to_string(),
            });
        }
        if self
            .find_activity(activity.name.as_str(), activity.category_name())?
            .is_some()
        {
            return Err(StoreError::Duplicate {
                kind: EntityKind::Activity,
                name: activity.qualified_name(),
            });
        }
        let stored = activity
            .clone()
            .with_id(ActivityId::new(self.allocate_id()));
        self.activities.push(stored.clone());
        Ok(stored)
    }

    fn create_tag(&mut self, tag: &Tag) -> StoreResult<Tag> {
        if self.find_tag(tag.name.as_str())?.is_some() {
            return Err(StoreError::Duplicate {
                kind: EntityKind::Tag,
                name: tag.name.to_string(),
            });
        }
        let stored = tag.clone().with_id(TagId::new(self.allocate_id()));
        self.tags.push(stored.clone());
        Ok(stored)
    }

    fn facts_overlapping(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        exclude: Option<FactId>,
    ) -> StoreResult<Vec<FactRecord>> {
        let mut found: Vec<FactRecord> = self
            .facts
            .iter()
            .filter(|r| !r.deleted && Some(r.id) != exclude)
            .filter(|r| r.end.is_none_or(|e| e > start))
            .filter(|r| end.is_none_or(|e| r.start < e))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.start);
        Ok(found)
    }

    fn ongoing_fact(&self) -> StoreResult<Option<FactRecord>> {
        Ok(self
            .facts
            .iter()
            .find(|r| !r.deleted && r.end.is_none())
            .cloned())
    }

    fn get_fact(&self, id: FactId) -> StoreResult<Option<FactRecord>> {
        Ok(self.facts.iter().find(|r| r.id == id).cloned())
    }

    fn insert_fact(&mut self, fact: &Fact) -> StoreResult<FactId> {
        if let Some(id) = fact.id() {
            return Err(StoreError::Constraint {
                reason: format!("fact {id} is already stored"),
            });
        }
        Self::check_references(fact)?;
        self.check_single_ongoing(fact)?;
        let id = FactId::new(self.allocate_id());
        self.facts.push(to_record(id, fact));
        Ok(id)
    }

    fn update_fact(&mut self, fact: &Fact) -> StoreResult<()> {
        let Some(id) = fact.id() else {
            return Err(StoreError::Unsaved {
                kind: EntityKind::Fact,
                name: fact.activity().qualified_name(),
            });
        };
        Self::check_references(fact)?;
        self.check_single_ongoing(fact)?;
        let slot = self
            .facts
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Fact,
                id: id.get(),
            })?;
        *slot = to_record(id, fact);
        Ok(())
    }

    fn delete_fact(&mut self, id: FactId) -> StoreResult<()> {
        let before = self.facts.len();
        self.facts.retain(|r| r.id != id);
        if self.facts.len() == before {
            return Err(StoreError::NotFound {
                kind: EntityKind::Fact,
                id: id.get(),
            });
        }
        for record in &mut self.facts {
            if record.split_from == Some(id) {
                record.split_from = None;
            }
        }
        Ok(())
    }

    fn run_in_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            tracing::warn!("rolling back in-memory transaction");
            *self = snapshot;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Candidate;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn stored_activity(store: &mut MemoryStore, name: &str) -> Activity {
        store
            .create_activity(&Activity::new(name, None).unwrap())
            .expect("create activity")
    }

    fn closed(activity: &Activity, start: &str, end: &str) -> Fact {
        Fact::accept(Candidate::new(activity.clone(), at(start)).ending(at(end)))
    }

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() {
        let mut store = MemoryStore::new();
        store.create_category(&Category::new("Work").unwrap()).unwrap();
        let err = store
            .create_category(&Category::new("work").unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate { kind: EntityKind::Category, .. }
        ));
    }

    #[test]
    fn activity_names_are_scoped_by_category() {
        let mut store = MemoryStore::new();
        let work = store.create_category(&Category::new("work").unwrap()).unwrap();
        store
            .create_activity(&Activity::new("coding", Some(work)).unwrap())
            .unwrap();
        store
            .create_activity(&Activity::new("coding", None).unwrap())
            .expect("uncategorized scope is separate");
        assert_eq!(store.activities_named("CODING").unwrap().len(), 2);
        assert!(store.create_activity(&Activity::new("coding", None).unwrap()).is_err());
    }

    #[test]
    fn activity_requires_saved_category() {
        let mut store = MemoryStore::new();
        let unsaved = Category::new("work").unwrap();
        let err = store
            .create_activity(&Activity::new("coding", Some(unsaved)).unwrap())
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsaved { kind: EntityKind::Category, .. }));
    }

    #[test]
    fn insert_requires_saved_activity() {
        let mut store = MemoryStore::new();
        let activity = Activity::new("coding", None).unwrap();
        let fact = closed(&activity, "2019-02-16T09:00:00Z", "2019-02-16T10:00:00Z");
        assert!(matches!(
            store.insert_fact(&fact),
            Err(StoreError::Unsaved { kind: EntityKind::Activity, .. })
        ));
    }

    #[test]
    fn enforces_single_ongoing_fact() {
        let mut store = MemoryStore::new();
        let activity = stored_activity(&mut store, "coding");
        let open = Fact::accept(Candidate::new(activity.clone(), at("2019-02-16T09:00:00Z")));
        store.insert_fact(&open).unwrap();
        let err = store.insert_fact(&open).unwrap_err();
        assert!(matches!(err, StoreError::Constraint { .. }));
    }

    #[test]
    fn overlapping_query_uses_half_open_ranges() {
        let mut store = MemoryStore::new();
        let activity = stored_activity(&mut store, "coding");
        store
            .insert_fact(&closed(&activity, "2019-02-16T09:00:00Z", "2019-02-16T10:00:00Z"))
            .unwrap();
        let adjacent = store
            .facts_overlapping(at("2019-02-16T10:00:00Z"), Some(at("2019-02-16T11:00:00Z")), None)
            .unwrap();
        assert!(adjacent.is_empty());
        let inside = store
            .facts_overlapping(at("2019-02-16T09:30:00Z"), Some(at("2019-02-16T09:45:00Z")), None)
            .unwrap();
        assert_eq!(inside.len(), 1);
    }

    #[test]
    fn overlapping_query_treats_ongoing_as_unbounded() {
        let mut store = MemoryStore::new();
        let activity = stored_activity(&mut store, "coding");
        let id = store
            .insert_fact(&Fact::accept(Candidate::new(activity, at("2019-02-16T09:00:00Z"))))
            .unwrap();
        let found = store
            .facts_overlapping(at("2030-01-01T00:00:00Z"), None, None)
            .unwrap();
        assert_eq!(found.len(), 1);
        let excluded = store
            .facts_overlapping(at("2030-01-01T00:00:00Z"), None, Some(id))
            .unwrap();
        assert!(excluded.is_empty());
    }

    #[test]
    fn delete_fact_unlinks_split_pieces() {
        let mut store = MemoryStore::new();
        let activity = stored_activity(&mut store, "act");
        let left = store
            .insert_fact(&closed(&activity, "2019-02-16T09:00:00Z", "2019-02-16T10:00:00Z"))
            .unwrap();
        let mut right =
            closed(&activity, "2019-02-16T11:00:00Z", "2019-02-16T12:00:00Z").with_id(left);
        right.detach_as_split();
        let right = store.insert_fact(&right).unwrap();

        store.delete_fact(left).unwrap();
        assert!(store.get_fact(left).unwrap().is_none());
        assert_eq!(store.get_fact(right).unwrap().unwrap().split_from, None);
        assert!(matches!(
            store.delete_fact(left),
            Err(StoreError::NotFound {
                kind: EntityKind::Fact,
                ..
            })
        ));
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let mut store = MemoryStore::new();
        let result: Result<(), StoreError> = store.run_in_transaction(|s| {
            s.create_tag(&Tag::new("focus").unwrap())?;
            Err(StoreError::Constraint {
                reason: "abort".to_string(),
            })
        });
        assert!(result.is_err());
        assert!(store.find_tag("focus").unwrap().is_none());
    }

    #[test]
    fn successful_transaction_commits() {
        let mut store = MemoryStore::new();
        let result: Result<Tag, StoreError> =
            store.run_in_transaction(|s| s.create_tag(&Tag::new("focus").unwrap()));
        assert!(result.is_ok());
        assert!(store.find_tag("FOCUS").unwrap().is_some());
    }
}
