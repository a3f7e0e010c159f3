//! Eager loading of associations
//!
//! Preloads run after the primary fetch: one query per association level,
//! matched back onto the owning rows by key before the rows are turned into
//! records.

use std::collections::{HashMap, HashSet};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use super::builder::{Clause, Projection, Query};
use super::filters::is_identifier;
use super::traits::{Cardinality, Source};
use crate::db::Store;
use crate::db::sqlite_helpers::{JsonRow, join_key, json_to_sql};
use crate::error::Result;

/// Instruction to load an association alongside the primary result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preload {
    /// Association name on the owning schema
    pub name: String,
    /// Custom sub-query for the related rows
    pub scope: Option<Query>,
    /// Associations to load on the related rows
    pub nested: Vec<Preload>,
}

impl Preload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Also load `child` on every related row.
    pub fn with(mut self, child: Preload) -> Self {
        self.nested.push(child);
        self
    }

    /// Fetch related rows through `query` (filters, order, select, preloads).
    pub fn scoped(mut self, query: Query) -> Self {
        self.scope = Some(query);
        self
    }

    pub(crate) fn is_valid(&self) -> bool {
        is_identifier(&self.name) && self.nested.iter().all(Preload::is_valid)
    }
}

impl From<&str> for Preload {
    fn from(name: &str) -> Self {
        Preload::new(name)
    }
}

/// Load `preloads` for `rows` of `source`, attaching results under each
/// association name.
pub(crate) fn load<'a>(
    store: &'a Store,
    source: &'static Source,
    rows: &'a mut [JsonRow],
    preloads: &'a [Preload],
) -> BoxFuture<'a, Result<()>> {
    async move {
        for preload in preloads {
            let Some(association) = source.association(&preload.name) else {
                debug!(
                    table = source.table,
                    preload = %preload.name,
                    "Ignoring unknown association"
                );
                continue;
            };
            let related = (association.related)();

            // Distinct owner keys, in row order
            let mut seen = HashSet::new();
            let keys: Vec<_> = rows
                .iter()
                .filter_map(|row| row.get(association.owner_key))
                .filter(|value| join_key(value).is_some_and(|key| seen.insert(key)))
                .map(json_to_sql)
                .collect();

            let scope = preload.scope.clone().unwrap_or_default();
            let mut nested = preload.nested.clone();
            nested.extend(scope.preloads().iter().cloned());

            // The related key must come back to match rows to owners
            let mut query = scope.exclude(Clause::Preload);
            let partial = match query.projection() {
                Some(Projection::Fields(fields))
                    if !fields.iter().any(|f| f.as_str() == association.related_key) =>
                {
                    Some(fields.clone())
                }
                _ => None,
            };
            if let Some(mut fields) = partial {
                fields.push(association.related_key.to_string());
                query = query.select(Projection::Fields(fields));
            }
            let query = query.restrict_in(association.related_key, keys);

            let (sql, values) = query.to_select_sql(related);
            let mut children = store.fetch_rows(&sql, &values, related).await?;

            if !nested.is_empty() {
                load(store, related, &mut children, &nested).await?;
            }

            let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
            for child in children {
                if let Some(key) = child.get(association.related_key).and_then(join_key) {
                    grouped.entry(key).or_default().push(Value::Object(child));
                }
            }

            for row in rows.iter_mut() {
                let matches = row
                    .get(association.owner_key)
                    .and_then(join_key)
                    .and_then(|key| grouped.get(&key));

                let value = match association.cardinality {
                    Cardinality::Many => Value::Array(matches.cloned().unwrap_or_default()),
                    Cardinality::One => matches
                        .and_then(|found| found.first().cloned())
                        .unwrap_or(Value::Null),
                };
                row.insert(association.name.to_string(), value);
            }
        }
        Ok(())
    }
    .boxed()
}
