//! Error types for contextkit.

use crate::orm::changeset::{Changeset, FieldErrors};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the data access layer.
///
/// Fail-fast verbs (`*_or_fail`) report every failure through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Changeset invalid: attrs violated a constraint
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Target row no longer matches the expected state
    #[error("stale entity: the row was changed or deleted concurrently")]
    StaleEntity,

    #[error("expected a record, found none")]
    NotFound,

    #[error("expected at most one record, found several")]
    MultipleResults,

    #[error("unknown changeset function '{0}'")]
    UnknownChangeset(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record (de)serialization failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure of a non-raising mutation verb.
///
/// Expected outcomes keep their changeset so callers can inspect or
/// re-render it.
#[derive(Debug, thiserror::Error)]
pub enum Failure<S: std::fmt::Debug> {
    #[error("changeset is invalid: {}", .0.errors())]
    Invalid(Changeset<S>),

    #[error("stale entity")]
    Stale(Changeset<S>),

    #[error(transparent)]
    Store(Error),
}

impl<S: std::fmt::Debug> Failure<S> {
    pub fn changeset(&self) -> Option<&Changeset<S>> {
        match self {
            Failure::Invalid(changeset) | Failure::Stale(changeset) => Some(changeset),
            Failure::Store(_) => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Failure::Invalid(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Failure::Stale(_))
    }
}

impl<S: std::fmt::Debug> From<Error> for Failure<S> {
    fn from(err: Error) -> Self {
        Failure::Store(err)
    }
}

impl<S: std::fmt::Debug> From<sqlx::Error> for Failure<S> {
    fn from(err: sqlx::Error) -> Self {
        Failure::Store(Error::Database(err))
    }
}

impl<S: std::fmt::Debug> From<serde_json::Error> for Failure<S> {
    fn from(err: serde_json::Error) -> Self {
        Failure::Store(Error::Decode(err))
    }
}

impl<S: std::fmt::Debug> From<Failure<S>> for Error {
    fn from(failure: Failure<S>) -> Self {
        match failure {
            Failure::Invalid(changeset) => Error::Validation(changeset.errors().clone()),
            Failure::Stale(_) => Error::StaleEntity,
            Failure::Store(err) => err,
        }
    }
}
