//! SQLite helper utilities for type conversion
//!
//! Rows are surfaced as JSON objects so that any `Schema` type can be
//! deserialized from them. SQLite has no boolean, UUID or JSON column types;
//! the [`FieldKind`] of a column decides how its value is read and written.

use serde_json::{Map, Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row};

use crate::orm::{FieldKind, Source, SqlValue};

/// A decoded row keyed by column name.
pub type JsonRow = Map<String, Value>;

// ============================================================================
// Row decoding
// ============================================================================

/// Decode a SQLite row, using `source` to pick the kind of each column.
pub fn decode_row(row: &SqliteRow, source: &Source) -> Result<JsonRow, sqlx::Error> {
    let mut map = JsonRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let kind = source.field(column.name()).map(|f| f.kind);
        let value = decode_column(row, index, kind)?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn decode_column(
    row: &SqliteRow,
    index: usize,
    kind: Option<FieldKind>,
) -> Result<Value, sqlx::Error> {
    let value = match kind {
        Some(FieldKind::Integer) => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        Some(FieldKind::Boolean) => row
            .try_get::<Option<i64>, _>(index)?
            .map(|v| Value::Bool(v != 0)),
        Some(FieldKind::Real) => row.try_get::<Option<f64>, _>(index)?.map(float_to_json),
        Some(FieldKind::Text) => row.try_get::<Option<String>, _>(index)?.map(Value::String),
        Some(FieldKind::Json) => row
            .try_get::<Option<String>, _>(index)?
            .map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s))),
        // Computed columns: take whatever storage class decodes
        None => {
            if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
                v.map(Value::from)
            } else if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
                v.map(float_to_json)
            } else if let Ok(v) = row.try_get::<Option<String>, _>(index) {
                v.map(Value::String)
            } else {
                None
            }
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

#[inline]
fn float_to_json(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

// ============================================================================
// Value encoding
// ============================================================================

/// Convert a JSON value into a bindable SQL value.
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => n.as_f64().map(SqlValue::Float).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::String(s.clone()),
        other => SqlValue::String(other.to_string()),
    }
}

/// Encode a record field for storage in a column of `kind`.
pub fn encode_field(value: &Value, kind: FieldKind) -> SqlValue {
    match (kind, value) {
        (_, Value::Null) => SqlValue::Null,
        (FieldKind::Json, other) => SqlValue::String(other.to_string()),
        (_, other) => json_to_sql(other),
    }
}

/// Key used to match related rows during preloads.
#[inline]
pub fn join_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Generated values
// ============================================================================

/// Get current UTC timestamp as ISO8601 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Fresh v4 UUID for text primary keys
#[inline]
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
