//! Core traits and descriptors for the data access layer
//!
//! `Schema` is implemented by record structs, usually through
//! `#[derive(Schema)]` from `contextkit-macros`. The derive emits a static
//! [`Source`] describing the table, its columns and its associations; the
//! rest of the crate works from that descriptor alone.

use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::changeset::ChangesetFnPtr;

/// Storage class of a column, used to decode rows and encode values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Real,
    Text,
    /// Stored as INTEGER 0/1, surfaced as a JSON bool
    Boolean,
    /// Arbitrary serde value stored as JSON text
    Json,
}

impl FieldKind {
    /// SQLite column type (TEXT, INTEGER, REAL)
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Integer | FieldKind::Boolean => "INTEGER",
            FieldKind::Real => "REAL",
            FieldKind::Text | FieldKind::Json => "TEXT",
        }
    }
}

/// Column definition for a schema field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Column name in the database
    pub name: &'static str,
    pub kind: FieldKind,
    /// Whether the column can be NULL
    pub nullable: bool,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }

    /// Generate the column definition SQL
    fn to_sql(&self, source: &Source) -> String {
        let mut sql = format!("{} {}", self.name, self.kind.sql_type());

        if self.name == source.primary_key {
            sql.push_str(" PRIMARY KEY");
            if source.key_strategy == KeyStrategy::Autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }

        sql
    }
}

/// How primary key values come into existence on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// INTEGER key assigned by SQLite; omitted from INSERT while unset
    #[default]
    Autoincrement,
    /// TEXT key filled with a v4 UUID while unset
    Uuid,
    /// Caller always supplies the key
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Relation from one source to another, followed by preloads.
#[derive(Debug, Clone)]
pub struct Association {
    /// Field name the loaded records are attached under
    pub name: &'static str,
    pub cardinality: Cardinality,
    /// Column on the owning side whose value is looked up
    pub owner_key: &'static str,
    /// Column on the related side matched against `owner_key`
    pub related_key: &'static str,
    pub related: fn() -> &'static Source,
}

/// Static description of a table.
#[derive(Debug)]
pub struct Source {
    /// The SQL table name (e.g., "items")
    pub table: &'static str,
    /// The primary key column name (e.g., "id")
    pub primary_key: &'static str,
    pub key_strategy: KeyStrategy,
    pub fields: &'static [FieldDef],
    pub associations: &'static [Association],
    /// Integer version column checked and bumped on update/delete
    pub lock_field: Option<&'static str>,
    /// Maintain `inserted_at` / `updated_at` text columns
    pub timestamps: bool,
}

impl Source {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Columns read by a default SELECT, timestamps included
    pub fn column_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.fields.iter().map(|f| f.name).collect();
        if self.timestamps {
            for column in ["inserted_at", "updated_at"] {
                if !names.contains(&column) {
                    names.push(column);
                }
            }
        }
        names
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    pub fn create_table_sql(&self) -> String {
        let mut column_defs: Vec<String> = self.fields.iter().map(|f| f.to_sql(self)).collect();

        if self.timestamps {
            for column in ["inserted_at", "updated_at"] {
                if self.field(column).is_none() {
                    column_defs.push(format!("{} TEXT", column));
                }
            }
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.table,
            column_defs.join(",\n  ")
        )
    }
}

/// A record type backed by a table.
///
/// Rows are decoded into JSON objects and deserialized into `Self`, so
/// implementors should carry `#[serde(default)]`: a projection that skips a
/// column then leaves the field at its default instead of failing.
pub trait Schema:
    Serialize + DeserializeOwned + Default + Clone + Debug + Send + Sync + Unpin + 'static
{
    fn source() -> &'static Source;

    /// Resolve a changeset function by name (e.g. `"changeset"`).
    fn changeset_named(_name: &str) -> Option<ChangesetFnPtr<Self>> {
        None
    }
}

/// Represents a SQL value that can be bound to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder
    pub fn bind_to_query<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.clone()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
