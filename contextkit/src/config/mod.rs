//! Configuration management
//!
//! Settings are read once by the bootstrap code and then passed around
//! explicitly; nothing in the data access layer reads the environment.

use std::env;

use anyhow::{Context, Result};

/// Pagination defaults used when a request leaves page or per_page out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub page: i64,
    pub per_page: i64,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 40,
        }
    }
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite connection URL (e.g. `sqlite://data/app.db` or `sqlite::memory:`)
    pub database_url: String,

    /// Maximum connection pool size
    pub max_connections: u32,

    pub pagination: PageDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 5,
            pagination: PageDefaults::default(),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            None => defaults.max_connections,
        };

        let page_setting = |key: &str, fallback: i64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(fallback)
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),

            max_connections,

            pagination: PageDefaults {
                page: page_setting("CONTEXTKIT_PAGE", defaults.pagination.page),
                per_page: page_setting("CONTEXTKIT_PER_PAGE", defaults.pagination.per_page),
            },
        })
    }
}
