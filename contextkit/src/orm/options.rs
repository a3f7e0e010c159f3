//! Query options and the option compiler
//!
//! A caller describes a fetch as an ordered list of [`QueryOption`]s. The
//! compiler folds them left to right onto a base [`Query`]; each option kind
//! has its own handler and shapes no handler recognizes are skipped.

use tracing::debug;

use super::builder::{OrderItem, Projection, Query};
use super::filters::{Condition, is_identifier};
use super::preload::Preload;
use crate::config::PageDefaults;

pub use super::json_options::from_json;

/// Requested pagination window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// `(offset, limit)` when both page and per_page are positive.
    ///
    /// An offset past `i64::MAX` saturates, so far-off pages come back empty.
    pub fn window(&self) -> Option<(i64, i64)> {
        match (self.page, self.per_page) {
            (Some(page), Some(per_page)) if page > 0 && per_page > 0 => {
                Some(((page - 1).saturating_mul(per_page), per_page))
            }
            _ => None,
        }
    }

    /// Fill in missing or non-positive values from the defaults.
    pub fn resolve(&self, defaults: &PageDefaults) -> (i64, i64) {
        let page = self.page.filter(|p| *p > 0).unwrap_or(defaults.page);
        let per_page = self
            .per_page
            .filter(|p| *p > 0)
            .unwrap_or(defaults.per_page);
        (page, per_page)
    }
}

/// One entry of an option list.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOption {
    /// Eager-load associations
    Preload(Vec<Preload>),
    /// AND conditions onto the filter
    Where(Vec<Condition>),
    /// OR conditions onto the filter
    OrWhere(Vec<Condition>),
    Paginate(PageRequest),
    OrderBy(Vec<OrderItem>),
    Select(Projection),
    /// Any option the compiler has no handler for; left as a no-op
    Unrecognized(String),
}

impl QueryOption {
    pub fn filter(condition: Condition) -> Self {
        QueryOption::Where(vec![condition])
    }

    pub fn or_filter(condition: Condition) -> Self {
        QueryOption::OrWhere(vec![condition])
    }

    pub fn preload(name: impl Into<String>) -> Self {
        QueryOption::Preload(vec![Preload::new(name)])
    }

    pub fn paginate(page: i64, per_page: i64) -> Self {
        QueryOption::Paginate(PageRequest::new(page, per_page))
    }

    pub fn order_by(item: OrderItem) -> Self {
        QueryOption::OrderBy(vec![item])
    }

    pub fn select<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        QueryOption::Select(Projection::Fields(
            fields.into_iter().map(Into::into).collect(),
        ))
    }

    fn name(&self) -> &str {
        match self {
            QueryOption::Preload(_) => "preload",
            QueryOption::Where(_) => "where",
            QueryOption::OrWhere(_) => "or_where",
            QueryOption::Paginate(_) => "paginate",
            QueryOption::OrderBy(_) => "order_by",
            QueryOption::Select(_) => "select",
            QueryOption::Unrecognized(name) => name,
        }
    }
}

/// Fold `options` onto `base`. An absent base stays absent.
pub fn compile(base: Option<Query>, options: &[QueryOption]) -> Option<Query> {
    let base = base?;
    Some(options.iter().fold(base, apply))
}

/// Compile `options` onto an empty query.
pub fn build(options: &[QueryOption]) -> Query {
    options.iter().fold(Query::new(), apply)
}

/// Apply a single option.
pub fn apply(query: Query, option: &QueryOption) -> Query {
    match option {
        QueryOption::Preload(preloads) => preloads.iter().fold(query, |query, preload| {
            if preload.is_valid() {
                query.preload(preload.clone())
            } else {
                debug!(preload = %preload.name, "Ignoring malformed preload");
                query
            }
        }),
        QueryOption::Where(conditions) => {
            recognized(conditions, option.name()).fold(query, |query, c| query.filter(c.clone()))
        }
        QueryOption::OrWhere(conditions) => recognized(conditions, option.name())
            .fold(query, |query, c| query.or_filter(c.clone())),
        QueryOption::Paginate(request) => match request.window() {
            Some((offset, limit)) => query.offset(offset).limit(limit),
            None => {
                debug!(?request, "Ignoring malformed paginate option");
                query
            }
        },
        QueryOption::OrderBy(items) => items.iter().fold(query, |query, item| {
            if is_identifier(&item.field) {
                query.order_by(item.clone())
            } else {
                debug!(field = %item.field, "Ignoring malformed order_by key");
                query
            }
        }),
        QueryOption::Select(projection) => query.select(projection.clone()),
        QueryOption::Unrecognized(name) => {
            debug!(option = %name, "Ignoring unrecognized query option");
            query
        }
    }
}

fn recognized<'a>(
    conditions: &'a [Condition],
    option: &'a str,
) -> impl Iterator<Item = &'a Condition> + 'a {
    conditions.iter().filter(move |condition| {
        let keep = condition.to_sql().is_some();
        if !keep {
            debug!(option, ?condition, "Dropping unrecognized condition");
        }
        keep
    })
}

/// Remove every `Paginate` option and append one for the given window.
pub(crate) fn with_window(options: &[QueryOption], page: i64, per_page: i64) -> Vec<QueryOption> {
    options
        .iter()
        .filter(|option| !matches!(option, QueryOption::Paginate(_)))
        .cloned()
        .chain(std::iter::once(QueryOption::paginate(page, per_page)))
        .collect()
}

/// The last `Paginate` request in the list, if any.
pub(crate) fn page_request(options: &[QueryOption]) -> PageRequest {
    options
        .iter()
        .rev()
        .find_map(|option| match option {
            QueryOption::Paginate(request) => Some(*request),
            _ => None,
        })
        .unwrap_or_default()
}
