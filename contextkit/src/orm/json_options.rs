//! Loosely shaped option lists
//!
//! Callers holding untyped input (request bodies, config files) describe a
//! fetch as JSON, either a list of `[key, value]` pairs or an object:
//!
//! ```json
//! [
//!   ["where", ["reference", "gt", "item_090"]],
//!   ["or_where", {"reference": "item_001"}],
//!   ["order_by", ["cost", ["desc", "reference"]]],
//!   ["paginate", {"page": 2, "per_page": 10}],
//!   ["select", ["id", "reference"]],
//!   ["preload", {"items": "tags"}]
//! ]
//! ```
//!
//! Shapes that do not fit are dropped, never reported.

use serde_json::Value;
use tracing::debug;

use super::builder::{OrderItem, Projection, SortDirection};
use super::filters::{Condition, Fragment};
use super::options::{PageRequest, QueryOption};
use super::preload::Preload;
use crate::db::sqlite_helpers::json_to_sql;

/// Convert a JSON option list into typed options.
pub fn from_json(value: &Value) -> Vec<QueryOption> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(key), value]) => Some(option(key, value)),
                _ => {
                    debug!(%entry, "Ignoring malformed option entry");
                    None
                }
            })
            .collect(),
        Value::Object(map) => map.iter().map(|(key, value)| option(key, value)).collect(),
        _ => Vec::new(),
    }
}

fn option(key: &str, value: &Value) -> QueryOption {
    match key {
        "where" => QueryOption::Where(conditions(value)),
        "or_where" => QueryOption::OrWhere(conditions(value)),
        "paginate" => QueryOption::Paginate(page_request(value)),
        "order_by" => QueryOption::OrderBy(order_items(value)),
        "select" => match projection(value) {
            Some(projection) => QueryOption::Select(projection),
            None => QueryOption::Unrecognized(key.to_string()),
        },
        "preload" => QueryOption::Preload(preloads(value)),
        other => QueryOption::Unrecognized(other.to_string()),
    }
}

/// One condition, a list of them, an equality map or a raw SQL string.
fn conditions(value: &Value) -> Vec<Condition> {
    match value {
        Value::String(sql) => vec![Condition::fragment(Fragment::new(sql.as_str()))],
        Value::Object(map) => map
            .iter()
            .map(|(field, value)| Condition::eq(field.as_str(), json_to_sql(value)))
            .collect(),
        Value::Array(items) if matches!(items.first(), Some(Value::String(_))) => {
            condition(items).into_iter().collect()
        }
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::Array(parts) => condition(parts).into_iter().collect(),
                other => conditions(other),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn condition(parts: &[Value]) -> Option<Condition> {
    let (field, rest) = match parts.split_first() {
        Some((Value::String(field), rest)) => (field.as_str(), rest),
        _ => return None,
    };

    match rest {
        [value] => Some(Condition::eq(field, json_to_sql(value))),
        [Value::String(token), Value::Array(bounds)] => Some(Condition::parse(
            field,
            token,
            bounds.iter().map(json_to_sql).collect(),
        )),
        [Value::String(token), values @ ..] if !values.is_empty() => Some(Condition::parse(
            field,
            token,
            values.iter().map(json_to_sql).collect(),
        )),
        _ => None,
    }
}

fn page_request(value: &Value) -> PageRequest {
    PageRequest {
        page: value.get("page").and_then(Value::as_i64),
        per_page: value.get("per_page").and_then(Value::as_i64),
    }
}

/// A bare field, a `[direction, field]` pair, a `{direction: field}` map,
/// or a list of any of those.
fn order_items(value: &Value) -> Vec<OrderItem> {
    match value {
        Value::String(field) => vec![OrderItem::asc(field.as_str())],
        Value::Object(map) => map
            .iter()
            .filter_map(|(direction, field)| order_pair(direction, field))
            .collect(),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::Array(pair) => match pair.as_slice() {
                    [Value::String(direction), field] => {
                        order_pair(direction, field).into_iter().collect()
                    }
                    _ => Vec::new(),
                },
                other => order_items(other),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn order_pair(direction: &str, field: &Value) -> Option<OrderItem> {
    let direction = direction.parse::<SortDirection>().ok()?;
    Some(OrderItem::new(field.as_str()?, direction))
}

fn projection(value: &Value) -> Option<Projection> {
    match value {
        Value::String(field) => Some(Projection::Fields(vec![field.clone()])),
        Value::Array(fields) => Some(Projection::Fields(
            fields
                .iter()
                .filter_map(|f| f.as_str().map(str::to_string))
                .collect(),
        )),
        Value::Object(map) => map
            .get("sql")
            .and_then(Value::as_str)
            .map(|sql| Projection::Fragment(sql.to_string())),
        _ => None,
    }
}

/// A name, a list, or a map from name to nested preloads.
fn preloads(value: &Value) -> Vec<Preload> {
    match value {
        Value::String(name) => vec![Preload::new(name.as_str())],
        Value::Array(items) => items.iter().flat_map(preloads).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(name, nested)| Preload {
                name: name.clone(),
                scope: None,
                nested: preloads(nested),
            })
            .collect(),
        _ => Vec::new(),
    }
}
