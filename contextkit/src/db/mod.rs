//! Database connection and statement execution

pub mod sqlite_helpers;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::{PageDefaults, Settings};
use crate::orm::{Source, SqlValue};

pub use sqlite_helpers::JsonRow;
use sqlite_helpers::decode_row;

/// Store handle: a connection pool plus the pagination defaults it was
/// configured with.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    page_defaults: PageDefaults,
}

impl Store {
    /// Create a new store from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            page_defaults: PageDefaults::default(),
        }
    }

    pub fn with_page_defaults(mut self, page_defaults: PageDefaults) -> Self {
        self.page_defaults = page_defaults;
        self
    }

    /// Open a connection pool from settings, creating the database file if
    /// it does not exist yet.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.database_url)
            .with_context(|| format!("Invalid database URL '{}'", settings.database_url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool).with_page_defaults(settings.pagination))
    }

    /// Private in-memory database on a single, never recycled connection.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn page_defaults(&self) -> &PageDefaults {
        &self.page_defaults
    }

    /// Run a raw statement, returning the number of affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %sql, "Executing statement");
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub(crate) async fn fetch_rows(
        &self,
        sql: &str,
        values: &[SqlValue],
        source: &Source,
    ) -> Result<Vec<JsonRow>, sqlx::Error> {
        tracing::debug!(sql = %sql, "Executing entity query");

        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(row, source)).collect()
    }

    pub(crate) async fn fetch_optional_row(
        &self,
        sql: &str,
        values: &[SqlValue],
        source: &Source,
    ) -> Result<Option<JsonRow>, sqlx::Error> {
        tracing::debug!(sql = %sql, "Executing entity query (one)");

        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }

        match query.fetch_optional(&self.pool).await? {
            Some(row) => Ok(Some(decode_row(&row, source)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn fetch_count(&self, sql: &str, values: &[SqlValue]) -> Result<i64, sqlx::Error> {
        use sqlx::Row;

        tracing::debug!(sql = %sql, "Executing count query");

        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }

        let row = query.fetch_one(&self.pool).await?;
        row.try_get(0)
    }

    /// Execute a write with bound values, returning the affected row count.
    pub(crate) async fn execute_with_binds(
        &self,
        sql: &str,
        values: &[SqlValue],
    ) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %sql, "Executing write");

        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }

        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}
