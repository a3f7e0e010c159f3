//! Data access verbs
//!
//! Every verb takes the store explicitly and works for any [`Schema`]. Read
//! verbs compile an option list into a [`Query`], run it and decode the rows;
//! write verbs run a changeset function first and only touch the store when
//! the changeset is valid.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use contextkit::orm::repository;
//! use contextkit::{ChangesetFn, Condition, Operator, QueryOption};
//!
//! let recent: Vec<Item> = repository::list(&store, &[
//!     QueryOption::filter(Condition::compare("reference", Operator::Gt, "item_090")),
//! ])
//! .await?;
//!
//! let item = repository::create_or_fail(
//!     &store,
//!     Item::default(),
//!     ChangesetFn::Named("changeset"),
//!     &attrs,
//! )
//! .await?;
//! ```

use serde_json::Value;

use super::builder::{Clause, Query};
use super::changeset::{Action, Attrs, Changeset, ChangesetFn};
use super::filters::Condition;
use super::options::{self, QueryOption};
use super::pagination::Pagination;
use super::preload;
use super::traits::{KeyStrategy, Schema, Source, SqlValue};
use crate::db::Store;
use crate::db::sqlite_helpers::{JsonRow, encode_field, json_to_sql, new_uuid, now_iso8601};
use crate::error::{Error, Failure, Result};

const INSERTED_AT: &str = "inserted_at";
const UPDATED_AT: &str = "updated_at";

// ============================================================================
// Reads
// ============================================================================

/// Fetch every record matching `opts`.
pub async fn list<S: Schema>(store: &Store, opts: &[QueryOption]) -> Result<Vec<S>> {
    fetch(store, &options::build(opts)).await
}

/// First page of the records matching `opts`, with counts.
pub async fn list_paginated<S: Schema>(
    store: &Store,
    opts: &[QueryOption],
) -> Result<Pagination<S>> {
    Pagination::create(store, opts).await
}

/// Number of records matching the filter in `opts`.
///
/// Projection, sort, window and preloads do not take part.
pub async fn count<S: Schema>(store: &Store, opts: &[QueryOption]) -> Result<i64> {
    let query = options::build(opts)
        .exclude(Clause::Select)
        .exclude(Clause::OrderBy)
        .exclude(Clause::Limit)
        .exclude(Clause::Offset)
        .exclude(Clause::Preload);

    let (sql, values) = query.to_count_sql(S::source());
    Ok(store.fetch_count(&sql, &values).await?)
}

/// Fetch by primary key. A missing row is `Ok(None)`.
pub async fn get<S: Schema>(
    store: &Store,
    id: impl Into<SqlValue>,
    opts: &[QueryOption],
) -> Result<Option<S>> {
    let source = S::source();
    let query = options::build(opts)
        .exclude(Clause::Offset)
        .restrict(Condition::eq(source.primary_key, id.into()))
        .limit(1);

    Ok(fetch(store, &query).await?.into_iter().next())
}

/// Fetch by primary key, failing with [`Error::NotFound`].
pub async fn get_or_fail<S: Schema>(
    store: &Store,
    id: impl Into<SqlValue>,
    opts: &[QueryOption],
) -> Result<S> {
    get(store, id, opts).await?.ok_or(Error::NotFound)
}

/// First record whose columns equal `clauses`.
///
/// Without an `order_by` option "first" is SQLite's natural row order.
pub async fn get_by<S: Schema>(
    store: &Store,
    clauses: &[(&str, SqlValue)],
    opts: &[QueryOption],
) -> Result<Option<S>> {
    let query = by_clauses(options::build(opts), clauses).limit(1);
    Ok(fetch(store, &query).await?.into_iter().next())
}

/// Exactly one record whose columns equal `clauses`.
pub async fn get_by_or_fail<S: Schema>(
    store: &Store,
    clauses: &[(&str, SqlValue)],
    opts: &[QueryOption],
) -> Result<S> {
    let query = by_clauses(options::build(opts), clauses).limit(2);
    let mut found = fetch::<S>(store, &query).await?;

    match found.len() {
        0 => Err(Error::NotFound),
        1 => Ok(found.remove(0)),
        _ => Err(Error::MultipleResults),
    }
}

fn by_clauses(query: Query, clauses: &[(&str, SqlValue)]) -> Query {
    clauses
        .iter()
        .fold(query.exclude(Clause::Offset), |query, (field, value)| {
            query.restrict(Condition::eq(*field, value.clone()))
        })
}

async fn fetch<S: Schema>(store: &Store, query: &Query) -> Result<Vec<S>> {
    let source = S::source();
    let (sql, values) = query.to_select_sql(source);
    let mut rows = store.fetch_rows(&sql, &values, source).await?;

    if !query.preloads().is_empty() {
        preload::load(store, source, &mut rows, query.preloads()).await?;
    }

    rows.into_iter().map(decode).collect()
}

fn decode<S: Schema>(row: JsonRow) -> Result<S> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn encode<S: Schema>(record: &S) -> Result<JsonRow> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Ok(JsonRow::new()),
    }
}

// ============================================================================
// Pure construction
// ============================================================================

/// Run `changeset` over `target` without touching the store.
pub fn change<S: Schema>(
    target: impl Into<Changeset<S>>,
    changeset: ChangesetFn<S>,
    attrs: &Attrs,
) -> Result<Changeset<S>> {
    changeset.call(target.into(), attrs)
}

/// Blank record with `attrs` merged in, then any preloads from `opts`
/// resolved against it.
pub async fn new<S: Schema>(store: &Store, attrs: &Attrs, opts: &[QueryOption]) -> Result<S> {
    let source = S::source();
    let mut row = encode(&S::default())?;
    for (field, value) in attrs {
        if row.contains_key(field) {
            row.insert(field.clone(), value.clone());
        }
    }

    let query = options::build(opts);
    if !query.preloads().is_empty() {
        let mut rows = [row];
        preload::load(store, source, &mut rows, query.preloads()).await?;
        let [loaded] = rows;
        row = loaded;
    }

    decode(row)
}

// ============================================================================
// Writes
// ============================================================================

/// Insert the record produced by `changeset(target, attrs)`.
pub async fn create<S: Schema>(
    store: &Store,
    target: impl Into<Changeset<S>>,
    changeset: ChangesetFn<S>,
    attrs: &Attrs,
) -> std::result::Result<S, Failure<S>> {
    let changeset = changeset.call(target.into(), attrs)?.with_action(Action::Insert);
    if !changeset.is_valid() {
        return Err(Failure::Invalid(changeset));
    }
    let record = match changeset.apply() {
        Ok(record) => record,
        Err(errors) => return Err(Failure::Invalid(changeset.with_errors(errors))),
    };

    let source = S::source();
    let mut row = encode(&record)?;
    let (columns, values) = insert_columns(source, &mut row);

    let placeholders = vec!["?"; values.len()].join(", ");
    let sql = if columns.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            source.table,
            source.column_names().join(", ")
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            source.table,
            columns.join(", "),
            placeholders,
            source.column_names().join(", ")
        )
    };

    match store.fetch_optional_row(&sql, &values, source).await {
        Ok(Some(stored)) => Ok(merge(row, stored)?),
        Ok(None) => Err(Failure::Stale(changeset)),
        Err(err) => Err(write_failure(err, changeset, source)),
    }
}

/// Like [`create`], failing with an [`Error`].
pub async fn create_or_fail<S: Schema>(
    store: &Store,
    target: impl Into<Changeset<S>>,
    changeset: ChangesetFn<S>,
    attrs: &Attrs,
) -> Result<S> {
    Ok(create(store, target, changeset, attrs).await?)
}

/// Persist the changes produced by `changeset(target, attrs)`.
///
/// Only changed columns are written. A row that is gone, or whose lock
/// version moved on, is reported as [`Failure::Stale`].
pub async fn update<S: Schema>(
    store: &Store,
    target: impl Into<Changeset<S>>,
    changeset: ChangesetFn<S>,
    attrs: &Attrs,
) -> std::result::Result<S, Failure<S>> {
    let changeset = changeset.call(target.into(), attrs)?.with_action(Action::Update);
    if !changeset.is_valid() {
        return Err(Failure::Invalid(changeset));
    }
    let record = match changeset.apply() {
        Ok(record) => record,
        Err(errors) => return Err(Failure::Invalid(changeset.with_errors(errors))),
    };

    let source = S::source();
    let original = encode(changeset.data())?;
    let row = encode(&record)?;

    let Some(id) = original.get(source.primary_key).filter(|v| !is_unset(v)) else {
        return Err(Failure::Stale(changeset));
    };
    let id = json_to_sql(id);

    let mut assignments = Vec::new();
    let mut values = Vec::new();
    for field in source.fields {
        if field.name == source.primary_key || Some(field.name) == source.lock_field {
            continue;
        }
        if source.timestamps && (field.name == INSERTED_AT || field.name == UPDATED_AT) {
            continue;
        }
        if let Some(value) = changeset.changes().get(field.name) {
            assignments.push(format!("{} = ?", field.name));
            values.push(encode_field(value, field.kind));
        }
    }

    if assignments.is_empty() {
        return Ok(record);
    }

    if source.timestamps {
        assignments.push(format!("{} = ?", UPDATED_AT));
        values.push(SqlValue::String(now_iso8601()));
    }

    let mut sql_where = format!("{} = ?", source.primary_key);
    values.push(id);

    if let Some(lock) = source.lock_field {
        assignments.push(format!("{} = {} + 1", lock, lock));
        sql_where.push_str(&format!(" AND {} = ?", lock));
        values.push(original.get(lock).map(json_to_sql).unwrap_or(SqlValue::Null));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        source.table,
        assignments.join(", "),
        sql_where,
        source.column_names().join(", ")
    );

    match store.fetch_optional_row(&sql, &values, source).await {
        Ok(Some(stored)) => Ok(merge(row, stored)?),
        Ok(None) => Err(Failure::Stale(changeset)),
        Err(err) => Err(write_failure(err, changeset, source)),
    }
}

/// Like [`update`], failing with an [`Error`].
pub async fn update_or_fail<S: Schema>(
    store: &Store,
    target: impl Into<Changeset<S>>,
    changeset: ChangesetFn<S>,
    attrs: &Attrs,
) -> Result<S> {
    Ok(update(store, target, changeset, attrs).await?)
}

/// Delete the record's row, returning the record.
///
/// Deleting a row that is already gone is [`Failure::Stale`].
pub async fn delete<S: Schema>(
    store: &Store,
    target: impl Into<Changeset<S>>,
) -> std::result::Result<S, Failure<S>> {
    let changeset = target.into().with_action(Action::Delete);
    if !changeset.is_valid() {
        return Err(Failure::Invalid(changeset));
    }

    let source = S::source();
    let row = encode(changeset.data())?;

    let Some(id) = row.get(source.primary_key).filter(|v| !is_unset(v)) else {
        return Err(Failure::Stale(changeset));
    };

    let mut sql = format!("DELETE FROM {} WHERE {} = ?", source.table, source.primary_key);
    let mut values = vec![json_to_sql(id)];

    if let Some(lock) = source.lock_field {
        sql.push_str(&format!(" AND {} = ?", lock));
        values.push(row.get(lock).map(json_to_sql).unwrap_or(SqlValue::Null));
    }

    match store.execute_with_binds(&sql, &values).await {
        Ok(0) => Err(Failure::Stale(changeset)),
        Ok(_) => Ok(changeset.data().clone()),
        Err(err) => Err(write_failure(err, changeset, source)),
    }
}

/// Like [`delete`], failing with an [`Error`].
pub async fn delete_or_fail<S: Schema>(store: &Store, target: impl Into<Changeset<S>>) -> Result<S> {
    Ok(delete(store, target).await?)
}

/// Column list and values for an INSERT of `row`, filling generated values
/// into `row` as it goes.
fn insert_columns(source: &Source, row: &mut JsonRow) -> (Vec<&'static str>, Vec<SqlValue>) {
    let now = now_iso8601();
    let mut columns = Vec::new();
    let mut values = Vec::new();

    for field in source.fields {
        let mut value = row.get(field.name).cloned().unwrap_or(Value::Null);

        if field.name == source.primary_key && is_unset(&value) {
            match source.key_strategy {
                KeyStrategy::Autoincrement => continue,
                KeyStrategy::Uuid => value = Value::String(new_uuid()),
                KeyStrategy::Manual => {}
            }
        }
        if Some(field.name) == source.lock_field {
            value = Value::from(1);
        }
        if source.timestamps && (field.name == INSERTED_AT || field.name == UPDATED_AT) {
            value = Value::String(now.clone());
        }

        row.insert(field.name.to_string(), value.clone());
        columns.push(field.name);
        values.push(encode_field(&value, field.kind));
    }

    if source.timestamps {
        for column in [INSERTED_AT, UPDATED_AT] {
            if !columns.contains(&column) {
                columns.push(column);
                values.push(SqlValue::String(now.clone()));
            }
        }
    }

    (columns, values)
}

/// Overlay the stored columns on the written record so attached
/// associations survive the round trip.
fn merge<S: Schema>(mut row: JsonRow, stored: JsonRow) -> Result<S> {
    row.extend(stored);
    decode(row)
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Turn a unique-index violation on a registered field into a field error;
/// everything else is a store failure.
fn write_failure<S: Schema>(err: sqlx::Error, changeset: Changeset<S>, source: &Source) -> Failure<S> {
    let taken = match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            let message = db_err.message();
            changeset
                .unique_fields()
                .iter()
                .find(|field| message.contains(&format!("{}.{}", source.table, field)))
                .cloned()
        }
        _ => None,
    };

    match taken {
        Some(field) => Failure::Invalid(changeset.add_error(field, "has already been taken")),
        None => Failure::Store(Error::Database(err)),
    }
}
