//! SQL query builder
//!
//! [`Query`] accumulates clauses and renders them into a parameterized
//! SQLite statement against a [`Source`]. It never touches the database;
//! execution lives in the repository module.

use std::fmt;
use std::str::FromStr;

use super::filters::{Condition, is_identifier};
use super::preload::Preload;
use super::traits::{Source, SqlValue};

/// Sort direction for ORDER BY clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl SortDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
            SortDirection::AscNullsFirst => "ASC NULLS FIRST",
            SortDirection::AscNullsLast => "ASC NULLS LAST",
            SortDirection::DescNullsFirst => "DESC NULLS FIRST",
            SortDirection::DescNullsLast => "DESC NULLS LAST",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            "asc_nulls_first" => Ok(SortDirection::AscNullsFirst),
            "asc_nulls_last" => Ok(SortDirection::AscNullsLast),
            "desc_nulls_first" => Ok(SortDirection::DescNullsFirst),
            "desc_nulls_last" => Ok(SortDirection::DescNullsLast),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderItem {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

/// Result projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Fields(Vec<String>),
    /// Raw select list, used verbatim
    Fragment(String),
}

/// Clause kinds that can be reset with [`Query::exclude`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Filter,
    OrderBy,
    Limit,
    Offset,
    Select,
    Preload,
}

/// Executor-side constraint, AND-ed around the compiled filter.
#[derive(Debug, Clone, PartialEq)]
enum Restriction {
    Condition(Condition),
    In(String, Vec<SqlValue>),
}

/// An incrementally built description of what to fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
    alternatives: Vec<Condition>,
    restrictions: Vec<Restriction>,
    order: Vec<OrderItem>,
    limit: Option<i64>,
    offset: Option<i64>,
    projection: Option<Projection>,
    preloads: Vec<Preload>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// AND a condition onto the filter.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// OR a condition onto the filter.
    pub fn or_filter(mut self, condition: Condition) -> Self {
        self.alternatives.push(condition);
        self
    }

    /// Constrain the whole result set, independent of `where`/`or_where`.
    pub fn restrict(mut self, condition: Condition) -> Self {
        self.restrictions.push(Restriction::Condition(condition));
        self
    }

    pub(crate) fn restrict_in(mut self, field: &str, values: Vec<SqlValue>) -> Self {
        self.restrictions
            .push(Restriction::In(field.to_string(), values));
        self
    }

    /// Append a sort key after the existing ones.
    pub fn order_by(mut self, item: OrderItem) -> Self {
        if is_identifier(&item.field) {
            self.order.push(item);
        }
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn preload(mut self, preload: Preload) -> Self {
        self.preloads.push(preload);
        self
    }

    /// Drop every clause of the given kind.
    pub fn exclude(mut self, clause: Clause) -> Self {
        match clause {
            Clause::Filter => {
                self.conditions.clear();
                self.alternatives.clear();
            }
            Clause::OrderBy => self.order.clear(),
            Clause::Limit => self.limit = None,
            Clause::Offset => self.offset = None,
            Clause::Select => self.projection = None,
            Clause::Preload => self.preloads.clear(),
        }
        self
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    pub fn order(&self) -> &[OrderItem] {
        &self.order
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    pub fn preloads(&self) -> &[Preload] {
        &self.preloads
    }

    /// Build the WHERE body.
    ///
    /// `where` conditions form an AND group and `or_where` conditions an OR
    /// group; with both present the result is `(and) OR (or)`. Restrictions
    /// are AND-ed around that.
    fn where_sql(&self) -> Option<(String, Vec<SqlValue>)> {
        let mut values = Vec::new();

        let and_group = render_group(&self.conditions, " AND ", &mut values);
        let or_group = render_group(&self.alternatives, " OR ", &mut values);

        let combined = match (and_group, or_group) {
            (Some(and), Some(or)) => Some(format!("({}) OR ({})", and, or)),
            (Some(group), None) | (None, Some(group)) => Some(group),
            (None, None) => None,
        };

        let mut parts: Vec<String> = Vec::new();
        if let Some(combined) = combined {
            if self.restrictions.is_empty() {
                parts.push(combined);
            } else {
                parts.push(format!("({})", combined));
            }
        }

        for restriction in &self.restrictions {
            match restriction {
                // A restriction never widens the result: one that cannot be
                // rendered matches nothing.
                Restriction::Condition(condition) => match condition.to_sql() {
                    Some((sql, params)) => {
                        parts.push(sql);
                        values.extend(params);
                    }
                    None => parts.push("0 = 1".to_string()),
                },
                Restriction::In(field, keys) => {
                    if keys.is_empty() {
                        parts.push("0 = 1".to_string());
                    } else {
                        let placeholders = vec!["?"; keys.len()].join(", ");
                        parts.push(format!("{} IN ({})", field, placeholders));
                        values.extend(keys.iter().cloned());
                    }
                }
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some((parts.join(" AND "), values))
        }
    }

    fn select_list(&self, source: &Source) -> String {
        match &self.projection {
            Some(Projection::Fragment(sql)) => sql.clone(),
            Some(Projection::Fields(fields)) => {
                let valid: Vec<&str> = fields
                    .iter()
                    .map(String::as_str)
                    .filter(|f| is_identifier(f))
                    .collect();
                if valid.is_empty() {
                    source.column_names().join(", ")
                } else {
                    valid.join(", ")
                }
            }
            None => source.column_names().join(", "),
        }
    }

    /// Build the SELECT statement.
    pub fn to_select_sql(&self, source: &Source) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT {} FROM {}", self.select_list(source), source.table);
        let mut values = Vec::new();

        if let Some((where_sql, where_values)) = self.where_sql() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            values = where_values;
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|item| format!("{} {}", item.field, item.direction.to_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if self.limit.is_some() || self.offset.is_some() {
            // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
            sql.push_str(&format!(" LIMIT {}", self.limit.unwrap_or(-1)));
        }

        if let Some(offset) = self.offset {
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        (sql, values)
    }

    /// Build a COUNT statement. Only the filter takes part.
    pub fn to_count_sql(&self, source: &Source) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT COUNT(*) FROM {}", source.table);
        let mut values = Vec::new();

        if let Some((where_sql, where_values)) = self.where_sql() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            values = where_values;
        }

        (sql, values)
    }
}

fn render_group(
    conditions: &[Condition],
    joiner: &str,
    values: &mut Vec<SqlValue>,
) -> Option<String> {
    let mut fragments = Vec::new();
    for condition in conditions {
        if let Some((sql, params)) = condition.to_sql() {
            fragments.push(sql);
            values.extend(params);
        }
    }
    if fragments.is_empty() {
        None
    } else {
        Some(fragments.join(joiner))
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql())
    }
}
