//! Storage layer for nark.
//!
//! Provides a SQLite [`Datastore`] for categories, activities, tags and facts
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` can be moved between threads but not shared without a `Mutex`.
//!
//! # Schema
//!
//! ## Names
//!
//! Entity names are stored as written, next to a case-folded `name_key`
//! column that carries the uniqueness constraints. Activity names are unique
//! per category, with `NULL` category treated as its own scope.
//!
//! ## Timestamps
//!
//! Timestamps are stored as TEXT in RFC 3339 format with whole seconds
//! (e.g., `2024-01-15T10:30:00Z`), so lexicographic order matches
//! chronological order.
//!
//! ## Ongoing facts
//!
//! A partial unique index admits at most one non-deleted fact with a `NULL`
//! `end_at`.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use nark_core::{
    Activity, ActivityId, Category, CategoryId, Datastore, EntityKind, Fact, FactId, FactRecord,
    Name, StoreError, StoreResult, Tag, TagId,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored fact timestamp.
    #[error("invalid timestamp for fact {fact_id}: {timestamp}")]
    TimestampParse {
        fact_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A uniqueness constraint on names was violated.
    #[error("{kind} {name:?} already exists")]
    Duplicate { kind: EntityKind, name: String },
    /// A write referenced an entity that has no id yet.
    #[error("{kind} {name:?} has not been saved")]
    Unsaved { kind: EntityKind, name: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },
    /// Inserting a fact that already has an id.
    #[error("fact {0} is already stored")]
    AlreadyStored(FactId),
    /// The single-ongoing-fact index rejected a write.
    #[error("another fact is already ongoing")]
    OngoingExists,
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate { kind, name } => Self::Duplicate { kind, name },
            DbError::Unsaved { kind, name } => Self::Unsaved { kind, name },
            DbError::NotFound { kind, id } => Self::NotFound { kind, id },
            DbError::AlreadyStored(_) | DbError::OngoingExists => Self::Constraint {
                reason: err.to_string(),
            },
            other => Self::Backend(Box::new(other)),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

const ACTIVITY_COLUMNS: &str = "
    a.id, a.name, a.deleted, a.hidden, c.id, c.name, c.deleted, c.hidden
    FROM activities a
    LEFT JOIN categories c ON c.id = a.category_id
";

const FACT_COLUMNS: &str = "
    f.id, f.start_at, f.end_at, f.description, f.deleted, f.split_from,
    a.id, a.name, a.deleted, a.hidden, c.id, c.name, c.deleted, c.hidden
    FROM facts f
    JOIN activities a ON a.id = f.activity_id
    LEFT JOIN categories c ON c.id = a.category_id
";

/// Which activities a name lookup considers.
#[derive(Clone, Copy)]
enum Scope<'a> {
    Any,
    /// `None` is the uncategorized scope.
    Category(Option<&'a str>),
}

/// A fact row with its timestamps still in text form.
struct FactRow {
    id: i64,
    start: String,
    end: Option<String>,
    description: Option<String>,
    deleted: bool,
    split_from: Option<i64>,
    activity: Activity,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL UNIQUE,
                deleted INTEGER NOT NULL DEFAULT 0,
                hidden INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL,
                category_id INTEGER,
                deleted INTEGER NOT NULL DEFAULT 0,
                hidden INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (category_id) REFERENCES categories(id)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_activities_scope
                ON activities(name_key, IFNULL(category_id, 0));

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL UNIQUE,
                deleted INTEGER NOT NULL DEFAULT 0,
                hidden INTEGER NOT NULL DEFAULT 0
            );

            -- start_at/end_at: RFC 3339 UTC (e.g., '2024-01-15T10:30:00Z')
            -- end_at IS NULL: the ongoing fact
            CREATE TABLE IF NOT EXISTS facts (
                id INTEGER PRIMARY KEY,
                start_at TEXT NOT NULL,
                end_at TEXT,
                activity_id INTEGER NOT NULL,
                description TEXT,
                deleted INTEGER NOT NULL DEFAULT 0,
                split_from INTEGER,
                FOREIGN KEY (activity_id) REFERENCES activities(id),
                FOREIGN KEY (split_from) REFERENCES facts(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_facts_start ON facts(start_at);
            CREATE INDEX IF NOT EXISTS idx_facts_end ON facts(end_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_facts_single_ongoing
                ON facts(deleted) WHERE end_at IS NULL AND deleted = 0;

            CREATE TABLE IF NOT EXISTS fact_tags (
                fact_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (fact_id, tag_id),
                FOREIGN KEY (fact_id) REFERENCES facts(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id)
            );

            CREATE INDEX IF NOT EXISTS idx_fact_tags_tag ON fact_tags(tag_id);
            ",
        )?;
        Ok(())
    }

    fn query_category(&self, name: &str) -> Result<Option<Category>, DbError> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, deleted, hidden FROM categories WHERE name_key = ?1",
                params![name_key(name)],
                |row| {
                    Ok(Category {
                        id: Some(CategoryId::new(row.get(0)?)),
                        name: name_column(row, 1)?,
                        deleted: row.get(2)?,
                        hidden: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    fn query_activities(&self, name: &str, scope: Scope<'_>) -> Result<Vec<Activity>, DbError> {
        let mut sql = format!("SELECT {ACTIVITY_COLUMNS} WHERE a.name_key = ?1");
        let category_key = match scope {
            Scope::Any => None,
            Scope::Category(None) => {
                sql.push_str(" AND a.category_id IS NULL");
                None
            }
            Scope::Category(Some(category)) => {
                sql.push_str(" AND c.name_key = ?2");
                Some(name_key(category))
            }
        };
        sql.push_str(" ORDER BY a.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let map = |row: &Row<'_>| activity_from_row(row, 0);
        let rows = match &category_key {
            Some(key) => stmt.query_map(params![name_key(name), key], &map)?,
            None => stmt.query_map(params![name_key(name)], &map)?,
        };
        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?);
        }
        Ok(activities)
    }

    fn query_tag(&self, name: &str) -> Result<Option<Tag>, DbError> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name, deleted, hidden FROM tags WHERE name_key = ?1",
                params![name_key(name)],
                |row| tag_from_row(row, 0),
            )
            .optional()?;
        Ok(tag)
    }

    fn insert_category(&mut self, category: &Category) -> Result<Category, DbError> {
        self.conn
            .execute(
                "INSERT INTO categories (name, name_key, deleted, hidden) VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.name.as_str(),
                    category.name.key(),
                    category.deleted,
                    category.hidden
                ],
            )
            .map_err(|err| duplicate_or(err, EntityKind::Category, category.name.as_str()))?;
        Ok(category
            .clone()
            .with_id(CategoryId::new(self.conn.last_insert_rowid())))
    }

    fn insert_activity(&mut self, activity: &Activity) -> Result<Activity, DbError> {
        let category_id = match &activity.category {
            Some(category) => Some(category.id.ok_or_else(|| DbError::Unsaved {
                kind: EntityKind::Category,
                name: category.name.to_string(),
            })?),
            None => None,
        };
        self.conn
            .execute(
                "INSERT INTO activities (name, name_key, category_id, deleted, hidden)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    activity.name.as_str(),
                    activity.name.key(),
                    category_id.map(CategoryId::get),
                    activity.deleted,
                    activity.hidden
                ],
            )
            .map_err(|err| duplicate_or(err, EntityKind::Activity, &activity.qualified_name()))?;
        Ok(activity
            .clone()
            .with_id(ActivityId::new(self.conn.last_insert_rowid())))
    }

    fn insert_tag(&mut self, tag: &Tag) -> Result<Tag, DbError> {
        self.conn
            .execute(
                "INSERT INTO tags (name, name_key, deleted, hidden) VALUES (?1, ?2, ?3, ?4)",
                params![tag.name.as_str(), tag.name.key(), tag.deleted, tag.hidden],
            )
            .map_err(|err| duplicate_or(err, EntityKind::Tag, tag.name.as_str()))?;
        Ok(tag.clone().with_id(TagId::new(self.conn.last_insert_rowid())))
    }

    fn query_facts(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<FactRecord>, DbError> {
        let sql = format!("SELECT {FACT_COLUMNS} WHERE {filter} ORDER BY f.start_at ASC, f.id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, |row| {
            Ok(FactRow {
                id: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
                description: row.get(3)?,
                deleted: row.get(4)?,
                split_from: row.get(5)?,
                activity: activity_from_row(row, 6)?,
            })
        })?;
        let mut facts = Vec::new();
        for row in rows {
            let row = row?;
            let tags = self.fact_tags(row.id)?;
            facts.push(FactRecord {
                id: FactId::new(row.id),
                start: parse_timestamp(&row.start, row.id)?,
                end: row
                    .end
                    .as_deref()
                    .map(|end| parse_timestamp(end, row.id))
                    .transpose()?,
                activity: row.activity,
                tags,
                description: row.description,
                deleted: row.deleted,
                split_from: row.split_from.map(FactId::new),
            });
        }
        Ok(facts)
    }

    fn fact_tags(&self, fact_id: i64) -> Result<Vec<Tag>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT t.id, t.name, t.deleted, t.hidden
            FROM fact_tags ft
            JOIN tags t ON t.id = ft.tag_id
            WHERE ft.fact_id = ?1
            ORDER BY ft.position ASC
            ",
        )?;
        let rows = stmt.query_map(params![fact_id], |row| tag_from_row(row, 0))?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    /// Writes a fact row and its tags atomically, inserting when `id` is
    /// `None` and updating otherwise.
    fn write_fact(&mut self, fact: &Fact, id: Option<FactId>) -> Result<FactId, DbError> {
        let activity = fact.activity();
        let activity_id = activity.id.ok_or_else(|| DbError::Unsaved {
            kind: EntityKind::Activity,
            name: activity.qualified_name(),
        })?;
        let mut tag_ids = Vec::with_capacity(fact.tags().len());
        for tag in fact.tags() {
            tag_ids.push(tag.id.ok_or_else(|| DbError::Unsaved {
                kind: EntityKind::Tag,
                name: tag.name.to_string(),
            })?);
        }

        let start = format_timestamp(fact.start());
        let end = fact.end().map(format_timestamp);
        let split_from = fact.split_from().map(FactId::get);

        let sp = self.conn.savepoint()?;
        let id = match id {
            None => {
                sp.execute(
                    "INSERT INTO facts
                         (start_at, end_at, activity_id, description, deleted, split_from)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        start,
                        end,
                        activity_id.get(),
                        fact.description(),
                        fact.is_deleted(),
                        split_from
                    ],
                )
                .map_err(ongoing_or)?;
                FactId::new(sp.last_insert_rowid())
            }
            Some(id) => {
                let changed = sp
                    .execute(
                        "UPDATE facts
                         SET start_at = ?2, end_at = ?3, activity_id = ?4, description = ?5,
                             deleted = ?6, split_from = ?7
                         WHERE id = ?1",
                        params![
                            id.get(),
                            start,
                            end,
                            activity_id.get(),
                            fact.description(),
                            fact.is_deleted(),
                            split_from
                        ],
                    )
                    .map_err(ongoing_or)?;
                if changed == 0 {
                    return Err(DbError::NotFound {
                        kind: EntityKind::Fact,
                        id: id.get(),
                    });
                }
                sp.execute("DELETE FROM fact_tags WHERE fact_id = ?1", params![id.get()])?;
                id
            }
        };
        {
            let mut stmt = sp.prepare(
                "INSERT OR IGNORE INTO fact_tags (fact_id, tag_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, tag_id) in tag_ids.iter().enumerate() {
                stmt.execute(params![id.get(), tag_id.get(), position])?;
            }
        }
        sp.commit()?;
        Ok(id)
    }
}

impl Datastore for Database {
    fn find_category(&self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self.query_category(name)?)
    }

    fn find_activity(&self, name: &str, category: Option<&str>) -> StoreResult<Option<Activity>> {
        Ok(self.query_activities(name, Scope::Category(category))?.into_iter().next())
    }

    fn activities_named(&self, name: &str) -> StoreResult<Vec<Activity>> {
        Ok(self.query_activities(name, Scope::Any)?)
    }

    fn find_tag(&self, name: &str) -> StoreResult<Option<Tag>> {
        Ok(self.query_tag(name)?)
    }

    fn create_category(&mut self, category: &Category) -> StoreResult<Category> {
        Ok(self.insert_category(category)?)
    }

    fn create_activity(&mut self, activity: &Activity) -> StoreResult<Activity> {
        Ok(self.insert_activity(activity)?)
    }

    fn create_tag(&mut self, tag: &Tag) -> StoreResult<Tag> {
        Ok(self.insert_tag(tag)?)
    }

    fn facts_overlapping(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        exclude: Option<FactId>,
    ) -> StoreResult<Vec<FactRecord>> {
        let start = format_timestamp(start);
        let end = end.map(format_timestamp);
        let exclude = exclude.map(FactId::get);
        Ok(self.query_facts(
            "f.deleted = 0
             AND (f.end_at IS NULL OR f.end_at > ?1)
             AND (?2 IS NULL OR f.start_at < ?2)
             AND (?3 IS NULL OR f.id != ?3)",
            &[&start, &end, &exclude],
        )?)
    }

    fn ongoing_fact(&self) -> StoreResult<Option<FactRecord>> {
        Ok(self
            .query_facts("f.deleted = 0 AND f.end_at IS NULL", &[])?
            .into_iter()
            .next())
    }

    fn get_fact(&self, id: FactId) -> StoreResult<Option<FactRecord>> {
        Ok(self
            .query_facts("f.id = ?1", &[&id.get()])?
            .into_iter()
            .next())
    }

    fn insert_fact(&mut self, fact: &Fact) -> StoreResult<FactId> {
        if let Some(id) = fact.id() {
            return Err(DbError::AlreadyStored(id).into());
        }
        Ok(self.write_fact(fact, None)?)
    }

    fn update_fact(&mut self, fact: &Fact) -> StoreResult<()> {
        let Some(id) = fact.id() else {
            return Err(DbError::Unsaved {
                kind: EntityKind::Fact,
                name: fact.activity().qualified_name(),
            }
            .into());
        };
        self.write_fact(fact, Some(id))?;
        Ok(())
    }

    /// Tag links go with the row through `ON DELETE CASCADE`; split pieces
    /// are unlinked through `ON DELETE SET NULL`.
    fn delete_fact(&mut self, id: FactId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM facts WHERE id = ?1", params![id.get()])
            .map_err(DbError::from)?;
        if changed == 0 {
            return Err(DbError::NotFound {
                kind: EntityKind::Fact,
                id: id.get(),
            }
            .into());
        }
        Ok(())
    }

    /// Runs `f` between `BEGIN IMMEDIATE` and `COMMIT`, rolling back on error.
    ///
    /// A call made while a transaction is already open joins it.
    fn run_in_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        if !self.conn.is_autocommit() {
            return f(self);
        }
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|err| StoreError::from(DbError::from(err)))?;
        match f(self) {
            Ok(value) => {
                if let Err(err) = self.conn.execute_batch("COMMIT") {
                    rollback(&self.conn);
                    return Err(StoreError::from(DbError::from(err)).into());
                }
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("rolling back transaction");
                rollback(&self.conn);
                Err(err)
            }
        }
    }
}

fn rollback(conn: &Connection) {
    if let Err(err) = conn.execute_batch("ROLLBACK") {
        tracing::error!(error = %err, "rollback failed");
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn name_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Name> {
    let raw: String = row.get(idx)?;
    Name::new(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn tag_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: Some(TagId::new(row.get(offset)?)),
        name: name_column(row, offset + 1)?,
        deleted: row.get(offset + 2)?,
        hidden: row.get(offset + 3)?,
    })
}

/// Reads `a.id, a.name, a.deleted, a.hidden, c.id, c.name, c.deleted, c.hidden`.
fn activity_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Activity> {
    let category = match row.get::<_, Option<i64>>(offset + 4)? {
        Some(id) => Some(Category {
            id: Some(CategoryId::new(id)),
            name: name_column(row, offset + 5)?,
            deleted: row.get(offset + 6)?,
            hidden: row.get(offset + 7)?,
        }),
        None => None,
    };
    Ok(Activity {
        id: Some(ActivityId::new(row.get(offset)?)),
        name: name_column(row, offset + 1)?,
        category,
        deleted: row.get(offset + 2)?,
        hidden: row.get(offset + 3)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn duplicate_or(err: rusqlite::Error, kind: EntityKind, name: &str) -> DbError {
    if is_unique_violation(&err) {
        DbError::Duplicate {
            kind,
            name: name.to_string(),
        }
    } else {
        DbError::Sqlite(err)
    }
}

fn ongoing_or(err: rusqlite::Error) -> DbError {
    if is_unique_violation(&err) {
        DbError::OngoingExists
    } else {
        DbError::Sqlite(err)
    }
}

fn parse_timestamp(timestamp: &str, fact_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            fact_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
