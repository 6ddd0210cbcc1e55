//! Mapping of parsed names onto stored entities.

use crate::entity::{Activity, Category, Tag};
use crate::error::Error;
use crate::fact::Fact;
use crate::store::Datastore;
use crate::types::ValidationError;
use crate::warning::Warning;

const NO_CATEGORY: &str = "(uncategorized)";

/// Entities for a candidate fact. Entities without an id are new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntities {
    /// The activity, carrying its category.
    pub activity: Activity,
    pub tags: Vec<Tag>,
    pub warnings: Vec<Warning>,
}

/// Looks up names in a datastore without writing to it.
///
/// Unknown names resolve to new, unsaved entities when `implicit_create` is
/// set and to a [`ValidationError`] otherwise. New entities are written by
/// the manager when the fact is saved.
#[derive(Debug)]
pub struct EntityResolver<'a, S> {
    store: &'a S,
    implicit_create: bool,
}

impl<'a, S: Datastore> EntityResolver<'a, S> {
    pub const fn new(store: &'a S, implicit_create: bool) -> Self {
        Self {
            store,
            implicit_create,
        }
    }

    pub fn resolve(
        &self,
        activity: &str,
        category: Option<&str>,
        tags: &[String],
    ) -> Result<ResolvedEntities, Error> {
        let mut warnings = Vec::new();

        let category = match category {
            Some(name) => Some(self.resolve_category(name, &mut warnings)?),
            None => None,
        };
        let activity = self.resolve_activity(activity, category, &mut warnings)?;

        let mut resolved_tags: Vec<Tag> = Vec::with_capacity(tags.len());
        for name in tags {
            let tag = self.resolve_tag(name, &mut warnings)?;
            if !resolved_tags.iter().any(|t| t.name.key() == tag.name.key()) {
                resolved_tags.push(tag);
            }
        }

        tracing::debug!(
            activity = %activity.qualified_name(),
            tags = resolved_tags.len(),
            new = warnings.len(),
            "resolved entities"
        );
        Ok(ResolvedEntities {
            activity,
            tags: resolved_tags,
            warnings,
        })
    }

    fn resolve_category(
        &self,
        name: &str,
        warnings: &mut Vec<Warning>,
    ) -> Result<Category, Error> {
        if let Some(existing) = self.store.find_category(name)? {
            return Ok(existing);
        }
        if !self.implicit_create {
            return Err(ValidationError::UnknownCategory {
                name: name.to_string(),
            }
            .into());
        }
        let category = Category::new(name)?;
        warnings.push(Warning::NewCategory {
            name: category.name.to_string(),
        });
        Ok(category)
    }

    fn resolve_activity(
        &self,
        name: &str,
        category: Option<Category>,
        warnings: &mut Vec<Warning>,
    ) -> Result<Activity, Error> {
        let category_name = category.as_ref().map(|c| c.name.to_string());
        if category.as_ref().is_none_or(|c| c.id.is_some()) {
            if let Some(existing) = self.store.find_activity(name, category_name.as_deref())? {
                return Ok(existing);
            }
        }

        if !self.implicit_create {
            let requested = category_name.unwrap_or_else(|| NO_CATEGORY.to_string());
            if let Some(other) = self.store.activities_named(name)?.into_iter().next() {
                return Err(ValidationError::CategoryMismatch {
                    activity: name.to_string(),
                    requested,
                    existing: other.category_name().unwrap_or(NO_CATEGORY).to_string(),
                }
                .into());
            }
            return Err(ValidationError::UnknownActivity {
                name: name.to_string(),
                category: requested,
            }
            .into());
        }

        let activity = Activity::new(name, category)?;
        warnings.push(Warning::NewActivity {
            name: activity.qualified_name(),
        });
        Ok(activity)
    }

    fn resolve_tag(&self, name: &str, warnings: &mut Vec<Warning>) -> Result<Tag, Error> {
        if let Some(existing) = self.store.find_tag(name)? {
            return Ok(existing);
        }
        if !self.implicit_create {
            return Err(ValidationError::UnknownTag {
                name: name.to_string(),
            }
            .into());
        }
        let tag = Tag::new(name)?;
        warnings.push(Warning::NewTag {
            name: tag.name.to_string(),
        });
        Ok(tag)
    }
}

/// Writes the fact's unsaved entities and replaces them with stored ones.
///
/// Names are looked up again first, so an entity created earlier in the same
/// transaction is reused rather than duplicated.
pub(crate) fn materialize<S: Datastore>(store: &mut S, fact: &mut Fact) -> Result<(), Error> {
    let mut activity = fact.activity().clone();
    if activity.id.is_none() {
        let category = match activity.category.take() {
            Some(category) if category.id.is_none() => {
                Some(match store.find_category(category.name.as_str())? {
                    Some(existing) => existing,
                    None => {
                        let created = store.create_category(&category)?;
                        tracing::info!(category = %created.name, "created category");
                        created
                    }
                })
            }
            other => other,
        };
        activity.category = category;
        activity = match store.find_activity(activity.name.as_str(), activity.category_name())? {
            Some(existing) => existing,
            None => {
                let created = store.create_activity(&activity)?;
                tracing::info!(activity = %created.qualified_name(), "created activity");
                created
            }
        };
        fact.set_activity(activity);
    }

    if fact.tags().iter().any(|t| t.id.is_none()) {
        let mut tags = Vec::with_capacity(fact.tags().len());
        for tag in fact.tags() {
            if tag.id.is_some() {
                tags.push(tag.clone());
                continue;
            }
            let stored = match store.find_tag(tag.name.as_str())? {
                Some(existing) => existing,
                None => {
                    let created = store.create_tag(tag)?;
                    tracing::info!(tag = %created.name, "created tag");
                    created
                }
            };
            tags.push(stored);
        }
        fact.set_tags(tags);
    }
    Ok(())
}
