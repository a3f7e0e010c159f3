//! Offset pagination over an option list
//!
//! A [`Pagination`] is a value: navigation never mutates it, it returns a new
//! state with `page` and `entries` recomputed. The originating option list is
//! kept verbatim and the window is re-derived for every fetch.

use super::options::{self, PageRequest, QueryOption};
use super::repository;
use super::traits::Schema;
use crate::db::Store;
use crate::error::Result;

/// One page of records plus the counts needed to navigate.
#[derive(Debug, Clone)]
pub struct Pagination<S> {
    /// Current page, 1-based
    pub page: i64,
    pub per_page: i64,
    /// Matching rows across all pages, once counted
    pub entries_count: Option<i64>,
    /// `ceil(entries_count / per_page)`, once counted
    pub pages_count: Option<i64>,
    /// Records on the current page
    pub entries: Vec<S>,
    /// The option list this pagination was created from
    pub opts: Vec<QueryOption>,
    store: Store,
}

impl<S: Schema> Pagination<S> {
    /// Unfetched state. Missing or non-positive values in `request` fall back
    /// to the store's page defaults.
    pub fn new(store: &Store, opts: &[QueryOption], request: PageRequest) -> Self {
        let (page, per_page) = request.resolve(store.page_defaults());
        Self {
            page,
            per_page,
            entries_count: None,
            pages_count: None,
            entries: Vec::new(),
            opts: opts.to_vec(),
            store: store.clone(),
        }
    }

    /// Count the matching rows, then fetch the requested page.
    ///
    /// The window comes from the last `paginate` option in `opts`.
    pub async fn create(store: &Store, opts: &[QueryOption]) -> Result<Self> {
        let mut state = Self::new(store, opts, options::page_request(opts));

        let entries_count = repository::count::<S>(store, opts).await?;
        state.entries_count = Some(entries_count);
        state.pages_count = Some(pages_count(entries_count, state.per_page));
        state.entries = state.fetch(state.page).await?;

        tracing::debug!(
            page = state.page,
            per_page = state.per_page,
            entries_count,
            "Created pagination"
        );
        Ok(state)
    }

    /// Move to `target`. Out-of-range targets keep the current page and
    /// refresh its entries.
    pub async fn to_page(&self, target: i64) -> Result<Self> {
        let page = if self.in_range(target) { target } else { self.page };
        let entries = self.fetch(page).await?;

        Ok(Self {
            page,
            per_page: self.per_page,
            entries_count: self.entries_count,
            pages_count: self.pages_count,
            entries,
            opts: self.opts.clone(),
            store: self.store.clone(),
        })
    }

    pub async fn next(&self) -> Result<Self> {
        self.to_page(self.page.saturating_add(1)).await
    }

    pub async fn previous(&self) -> Result<Self> {
        self.to_page(self.page.saturating_sub(1)).await
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A zero page count means no target is ever in range.
    fn in_range(&self, target: i64) -> bool {
        self.pages_count
            .is_some_and(|pages| (1..=pages).contains(&target))
    }

    async fn fetch(&self, page: i64) -> Result<Vec<S>> {
        let opts = options::with_window(&self.opts, page, self.per_page);
        repository::list(&self.store, &opts).await
    }
}

fn pages_count(entries_count: i64, per_page: i64) -> i64 {
    entries_count / per_page + i64::from(entries_count % per_page != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_count_rounds_up() {
        assert_eq!(pages_count(0, 40), 0);
        assert_eq!(pages_count(1, 40), 1);
        assert_eq!(pages_count(40, 40), 1);
        assert_eq!(pages_count(41, 40), 2);
        assert_eq!(pages_count(100, 7), 15);
        assert_eq!(pages_count(3, i64::MAX), 1);
        assert_eq!(pages_count(i64::MAX, 1), i64::MAX);
        assert_eq!(pages_count(i64::MAX, 2), i64::MAX / 2 + 1);
    }
}
