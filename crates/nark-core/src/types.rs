//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for names and entity resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The value contains a character reserved by the factoid grammar.
    #[error("{field} cannot contain {forbidden:?}: {value}")]
    ReservedCharacter {
        field: &'static str,
        forbidden: char,
        value: String,
    },

    /// The value would be split apart when written into a factoid.
    #[error("{field} cannot contain a factoid separator: {value:?}")]
    Separator { field: &'static str, value: String },

    /// No category with this name exists and implicit creation is disabled.
    #[error("unknown category: {name}")]
    UnknownCategory { name: String },

    /// No activity with this name exists and implicit creation is disabled.
    #[error("unknown activity: {name}@{category}")]
    UnknownActivity { name: String, category: String },

    /// No tag with this name exists and implicit creation is disabled.
    #[error("unknown tag: {name}")]
    UnknownTag { name: String },

    /// The activity exists, but only under another category.
    #[error("activity {activity:?} belongs to {existing}, not {requested}")]
    CategoryMismatch {
        activity: String,
        requested: String,
        existing: String,
    },
}

/// A validated entity name.
///
/// Names are trimmed and must be non-empty. Identity comparisons between
/// names are case-insensitive; see [`Name::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Creates a new name after trimming and validation.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::for_field("name", name)
    }

    pub(crate) fn for_field(
        field: &'static str,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded identity key.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Returns true if `other` names the same entity.
    pub fn matches(&self, other: &str) -> bool {
        self.key() == other.trim().to_lowercase()
    }
}

impl TryFrom<String> for Name {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates a storage identifier newtype with common trait implementations.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw storage key.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw storage key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Storage key of a persisted fact.
    FactId
);

define_id!(
    /// Storage key of a persisted category.
    CategoryId
);

define_id!(
    /// Storage key of a persisted activity.
    ActivityId
);

define_id!(
    /// Storage key of a persisted tag.
    TagId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rejects_blank() {
        assert_eq!(
            Name::new("   ").unwrap_err(),
            ValidationError::Empty { field: "name" }
        );
        assert!(Name::new("coding").is_ok());
    }

    #[test]
    fn name_is_trimmed() {
        let name = Name::new("  deep work ").unwrap();
        assert_eq!(name.as_str(), "deep work");
    }

    #[test]
    fn name_matches_case_insensitively() {
        let name = Name::new("Écriture").unwrap();
        assert!(name.matches("écriture"));
        assert!(name.matches(" ÉCRITURE "));
        assert!(!name.matches("ecriture"));
    }

    #[test]
    fn name_serde_rejects_empty() {
        let result: Result<Name, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn name_serde_roundtrip() {
        let name = Name::new("reading").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"reading\"");
        let parsed: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = FactId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(id.to_string(), "42");
        assert_eq!(FactId::from(42).get(), 42);
    }
}
