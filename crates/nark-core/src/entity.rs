//! Categories, activities and tags.

use serde::{Deserialize, Serialize};

use crate::parser::{has_separator, tag_start};
use crate::types::{ActivityId, CategoryId, Name, TagId, ValidationError};

/// Rejects names a factoid could not carry intact: ones containing an item
/// separator, or a `#` starting a word.
fn factoid_safe(field: &'static str, name: Name) -> Result<Name, ValidationError> {
    if has_separator(name.as_str()) || tag_start(name.as_str()).is_some() {
        return Err(ValidationError::Separator {
            field,
            value: name.into(),
        });
    }
    Ok(name)
}

/// A grouping of activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<CategoryId>,
    pub name: Name,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl Category {
    /// Creates a new, unsaved category.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(Self {
            id: None,
            name: factoid_safe("category", Name::for_field("category", name)?)?,
            deleted: false,
            hidden: false,
        })
    }

    /// Returns the same category tagged with a storage id.
    #[must_use]
    pub fn with_id(mut self, id: CategoryId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Something time is spent on. Activities are scoped by their category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Option<ActivityId>,
    pub name: Name,
    pub category: Option<Category>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl Activity {
    /// Creates a new, unsaved activity.
    ///
    /// Activity names may not contain `@`, which separates the category in a
    /// factoid, nor anything else that would split the name when written as
    /// one.
    pub fn new(
        name: impl Into<String>,
        category: Option<Category>,
    ) -> Result<Self, ValidationError> {
        let name = Name::for_field("activity", name)?;
        if name.as_str().contains('@') {
            return Err(ValidationError::ReservedCharacter {
                field: "activity",
                forbidden: '@',
                value: name.into(),
            });
        }
        let name = factoid_safe("activity", name)?;
        Ok(Self {
            id: None,
            name,
            category,
            deleted: false,
            hidden: false,
        })
    }

    /// Returns the same activity tagged with a storage id.
    #[must_use]
    pub fn with_id(mut self, id: ActivityId) -> Self {
        self.id = Some(id);
        self
    }

    /// The category name, or `None` when uncategorized.
    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().map(|c| c.name.as_str())
    }

    /// Returns true when `(name, category)` identifies this activity.
    pub fn is_named(&self, name: &str, category: Option<&str>) -> bool {
        if !self.name.matches(name) {
            return false;
        }
        match (&self.category, category) {
            (None, None) => true,
            (Some(own), Some(other)) => own.name.matches(other),
            _ => false,
        }
    }

    /// Formats as `name@category`, or just `name` when uncategorized.
    pub fn qualified_name(&self) -> String {
        match &self.category {
            Some(category) => format!("{}@{}", self.name, category.name),
            None => self.name.to_string(),
        }
    }
}

/// A free-form label attached to facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Option<TagId>,
    pub name: Name,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub hidden: bool,
}

impl Tag {
    /// Creates a new, unsaved tag. Tag names may not start with `#`.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = Name::for_field("tag", name)?;
        if name.as_str().starts_with('#') {
            return Err(ValidationError::ReservedCharacter {
                field: "tag",
                forbidden: '#',
                value: name.into(),
            });
        }
        let name = factoid_safe("tag", name)?;
        Ok(Self {
            id: None,
            name,
            deleted: false,
            hidden: false,
        })
    }

    /// Returns the same tag tagged with a storage id.
    #[must_use]
    pub fn with_id(mut self, id: TagId) -> Self {
        self.id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_rejects_at_sign() {
        let err = Activity::new("a@b", None).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ReservedCharacter { forbidden: '@', .. }
        ));
    }

    #[test]
    fn activity_rejects_empty_name() {
        assert_eq!(
            Activity::new("  ", None).unwrap_err(),
            ValidationError::Empty { field: "activity" }
        );
    }

    #[test]
    fn tag_rejects_leading_hash() {
        assert!(Tag::new("#oops").is_err());
        assert!(Tag::new("c#").is_ok());
    }

    #[test]
    fn names_reject_factoid_separators() {
        for name in ["lunch, team", "deep #work", "review:", "a: b", "#meta"] {
            let err = Activity::new(name, None).unwrap_err();
            assert!(
                matches!(
                    err,
                    ValidationError::Separator { .. } | ValidationError::ReservedCharacter { .. }
                ),
                "{name}: {err:?}"
            );
        }
        assert!(matches!(
            Tag::new("a: b"),
            Err(ValidationError::Separator { field: "tag", .. })
        ));
        assert!(matches!(
            Tag::new("one #two"),
            Err(ValidationError::Separator { field: "tag", .. })
        ));
        assert!(matches!(
            Category::new("home, garden"),
            Err(ValidationError::Separator {
                field: "category",
                ..
            })
        ));
    }

    #[test]
    fn names_keep_punctuation_inside_words() {
        assert!(Activity::new("meeting at 10:30,ok", None).is_ok());
        assert!(Activity::new("c# review", None).is_ok());
        assert!(Tag::new("v1.2:rc").is_ok());
        assert!(Category::new("r&d").is_ok());
    }

    #[test]
    fn activity_identity_includes_category() {
        let work = Category::new("Work").unwrap();
        let activity = Activity::new("Coding", Some(work)).unwrap();
        assert!(activity.is_named("coding", Some("work")));
        assert!(!activity.is_named("coding", None));
        assert!(!activity.is_named("coding", Some("home")));

        let loose = Activity::new("coding", None).unwrap();
        assert!(loose.is_named("CODING", None));
        assert!(!loose.is_named("coding", Some("work")));
    }

    #[test]
    fn qualified_name_formats_category() {
        let work = Category::new("work").unwrap();
        assert_eq!(
            Activity::new("coding", Some(work)).unwrap().qualified_name(),
            "coding@work"
        );
        assert_eq!(
            Activity::new("coding", None).unwrap().qualified_name(),
            "coding"
        );
    }
}
