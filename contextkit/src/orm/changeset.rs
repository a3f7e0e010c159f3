//! Changesets: proposed, validated record mutations
//!
//! A changeset pairs a base record with pending changes and the errors
//! collected while casting and validating them. Changeset functions are
//! plain `fn(Changeset<S>, &Attrs) -> Changeset<S>` values; they receive a
//! fresh changeset for a record or an existing one to extend.
//!
//! ```rust,ignore
//! fn changeset(changeset: Changeset<Item>, attrs: &Attrs) -> Changeset<Item> {
//!     changeset
//!         .cast(attrs, &["reference", "cost"])
//!         .validate_required(&["reference"])
//!         .validate_number("cost", NumberRange::at_least(0.0))
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::traits::{FieldKind, Schema};
use crate::error::{Error, Result};

/// Raw attribute map handed to changeset functions.
pub type Attrs = Map<String, Value>;

/// Function pointer form of a changeset function.
pub type ChangesetFnPtr<S> = fn(Changeset<S>, &Attrs) -> Changeset<S>;

/// Per-field validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages recorded for `field`
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// What a changeset was last used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Insert,
    Update,
    Delete,
}

/// Numeric bounds for [`Changeset::validate_number`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberRange {
    pub greater_than: Option<f64>,
    pub greater_than_or_equal_to: Option<f64>,
    pub less_than: Option<f64>,
    pub less_than_or_equal_to: Option<f64>,
}

impl NumberRange {
    pub fn at_least(min: f64) -> Self {
        Self {
            greater_than_or_equal_to: Some(min),
            ..Default::default()
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            less_than_or_equal_to: Some(max),
            ..Default::default()
        }
    }

    fn violation(&self, n: f64) -> Option<String> {
        if let Some(bound) = self.greater_than {
            if n <= bound {
                return Some(format!("must be greater than {}", bound));
            }
        }
        if let Some(bound) = self.greater_than_or_equal_to {
            if n < bound {
                return Some(format!("must be greater than or equal to {}", bound));
            }
        }
        if let Some(bound) = self.less_than {
            if n >= bound {
                return Some(format!("must be less than {}", bound));
            }
        }
        if let Some(bound) = self.less_than_or_equal_to {
            if n > bound {
                return Some(format!("must be less than or equal to {}", bound));
            }
        }
        None
    }
}

/// A proposed mutation of a record.
#[derive(Debug, Clone)]
pub struct Changeset<S> {
    data: S,
    changes: Attrs,
    errors: FieldErrors,
    unique: Vec<String>,
    action: Option<Action>,
}

impl<S: Schema> From<S> for Changeset<S> {
    fn from(data: S) -> Self {
        Changeset::new(data)
    }
}

impl<S> Changeset<S> {
    pub fn new(data: S) -> Self {
        Self {
            data,
            changes: Attrs::new(),
            errors: FieldErrors::new(),
            unique: Vec::new(),
            action: None,
        }
    }

    /// The base record, without pending changes
    pub fn data(&self) -> &S {
        &self.data
    }

    pub fn changes(&self) -> &Attrs {
        &self.changes
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn action(&self) -> Option<Action> {
        self.action
    }

    pub(crate) fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub(crate) fn unique_fields(&self) -> &[String] {
        &self.unique
    }

    /// Pending change for `field`, if any
    pub fn get_change(&self, field: &str) -> Option<&Value> {
        self.changes.get(field)
    }
}

impl<S: Schema> Changeset<S> {
    /// Pending change for `field`, falling back to the base record's value.
    pub fn get_field(&self, field: &str) -> Option<Value> {
        if let Some(value) = self.changes.get(field) {
            return Some(value.clone());
        }
        match serde_json::to_value(&self.data) {
            Ok(Value::Object(mut map)) => map.remove(field),
            _ => None,
        }
    }

    /// Copy permitted attrs into the change set, casting them to the
    /// column kind. Values equal to the base record are not changes.
    pub fn cast(mut self, attrs: &Attrs, permitted: &[&str]) -> Self {
        let current = match serde_json::to_value(&self.data) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        for field in permitted {
            let Some(raw) = attrs.get(*field) else {
                continue;
            };

            let cast = match S::source().field(field) {
                Some(def) => cast_value(def.kind, raw),
                None => Some(raw.clone()),
            };

            match cast {
                Some(value) if current.get(*field) == Some(&value) => {
                    self.changes.remove(*field);
                }
                Some(value) => {
                    self.changes.insert(field.to_string(), value);
                }
                None => self.errors.add(*field, "is invalid"),
            }
        }
        self
    }

    /// Set a change directly, bypassing casting.
    pub fn put_change(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.changes.insert(field.into(), value.into());
        self
    }

    pub fn add_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.add(field, message);
        self
    }

    /// Fields must be present (change or base value), non-null and not blank.
    pub fn validate_required(mut self, fields: &[&str]) -> Self {
        for field in fields {
            let missing = match self.get_field(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            };
            if missing && !self.errors.contains(field) {
                self.errors.add(*field, "can't be blank");
            }
        }
        self
    }

    /// Check the pending change of a numeric field against `range`.
    pub fn validate_number(mut self, field: &str, range: NumberRange) -> Self {
        if let Some(n) = self.changes.get(field).and_then(Value::as_f64) {
            if let Some(message) = range.violation(n) {
                self.errors.add(field, message);
            }
        }
        self
    }

    /// Check the character length of a pending string change.
    pub fn validate_length(mut self, field: &str, min: Option<usize>, max: Option<usize>) -> Self {
        if let Some(s) = self.changes.get(field).and_then(Value::as_str) {
            let len = s.chars().count();
            if let Some(min) = min.filter(|min| len < *min) {
                self.errors
                    .add(field, format!("should be at least {} character(s)", min));
            } else if let Some(max) = max.filter(|max| len > *max) {
                self.errors
                    .add(field, format!("should be at most {} character(s)", max));
            }
        }
        self
    }

    /// The pending string change must be one of `allowed`.
    pub fn validate_inclusion(mut self, field: &str, allowed: &[&str]) -> Self {
        if let Some(s) = self.changes.get(field).and_then(Value::as_str) {
            if !allowed.contains(&s) {
                self.errors.add(field, "is invalid");
            }
        }
        self
    }

    /// Run a custom check on the pending change; `Some(message)` is an error.
    pub fn validate_with<F>(mut self, field: &str, check: F) -> Self
    where
        F: Fn(&Value) -> Option<String>,
    {
        if let Some(message) = self.changes.get(field).and_then(check) {
            self.errors.add(field, message);
        }
        self
    }

    /// Report a unique-index violation on `field` as a field error instead
    /// of a store error.
    pub fn unique_constraint(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }

    /// Merge the changes into the base record.
    pub fn apply(&self) -> std::result::Result<S, FieldErrors> {
        if !self.is_valid() {
            return Err(self.errors.clone());
        }

        let mut merged = match serde_json::to_value(&self.data) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (field, value) in &self.changes {
            merged.insert(field.clone(), value.clone());
        }

        serde_json::from_value(Value::Object(merged)).map_err(|err| {
            let mut errors = FieldErrors::new();
            errors.add("base", err.to_string());
            errors
        })
    }

    pub(crate) fn with_errors(mut self, errors: FieldErrors) -> Self {
        for (field, messages) in errors.iter() {
            for message in messages {
                self.errors.add(field, message.clone());
            }
        }
        self
    }
}

/// Cast a raw attribute to the JSON shape of `kind`.
fn cast_value(kind: FieldKind, raw: &Value) -> Option<Value> {
    match (kind, raw) {
        (_, Value::Null) => Some(Value::Null),
        (FieldKind::Json, value) => Some(value.clone()),
        (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(raw.clone()),
        (FieldKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (FieldKind::Real, Value::Number(n)) => n.as_f64().map(Value::from),
        (FieldKind::Real, Value::String(s)) => s.trim().parse::<f64>().ok().map(Value::from),
        (FieldKind::Boolean, Value::Bool(_)) => Some(raw.clone()),
        (FieldKind::Boolean, Value::String(s)) => match s.as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldKind::Text, Value::String(_)) => Some(raw.clone()),
        _ => None,
    }
}

/// How a verb obtains its changeset function.
pub enum ChangesetFn<S> {
    /// Resolved with [`Schema::changeset_named`]
    Named(&'static str),
    Func(ChangesetFnPtr<S>),
}

impl<S> Clone for ChangesetFn<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for ChangesetFn<S> {}

impl<S> fmt::Debug for ChangesetFn<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangesetFn::Named(name) => f.debug_tuple("Named").field(name).finish(),
            ChangesetFn::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<S> From<ChangesetFnPtr<S>> for ChangesetFn<S> {
    fn from(func: ChangesetFnPtr<S>) -> Self {
        ChangesetFn::Func(func)
    }
}

impl<S: Schema> ChangesetFn<S> {
    pub fn resolve(&self) -> Result<ChangesetFnPtr<S>> {
        match self {
            ChangesetFn::Func(func) => Ok(*func),
            ChangesetFn::Named(name) => {
                S::changeset_named(name).ok_or_else(|| Error::UnknownChangeset(name.to_string()))
            }
        }
    }

    pub fn call(&self, target: Changeset<S>, attrs: &Attrs) -> Result<Changeset<S>> {
        let func = self.resolve()?;
        Ok(func(target, attrs))
    }
}
