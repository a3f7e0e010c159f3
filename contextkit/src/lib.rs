//! contextkit
//!
//! CRUD accessors for SQLite-backed record types. A record derives
//! [`Schema`], a context type implements [`Context`], and [`crud_context!`]
//! generates the list/get/create/update/delete/change/new functions on it,
//! all forwarding to [`orm::repository`].
//!
//! ```rust,ignore
//! use contextkit::{Context, Schema, Store, crud_context};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Schema)]
//! #[serde(default)]
//! #[schema(table = "items", changesets(changeset))]
//! pub struct Item {
//!     pub id: i64,
//!     pub reference: String,
//!     pub cost: i64,
//! }
//!
//! pub struct Catalog {
//!     store: Store,
//! }
//!
//! impl Context for Catalog {
//!     fn store(&self) -> &Store {
//!         &self.store
//!     }
//! }
//!
//! crud_context!(Catalog, Item);
//!
//! let items = catalog.list_items(&[]).await?;
//! ```

extern crate self as contextkit;

pub mod config;
pub mod db;
pub mod error;
pub mod orm;
pub mod telemetry;

pub use config::{PageDefaults, Settings};
pub use db::Store;
pub use error::{Error, Failure, Result};
pub use orm::{
    Association, Attrs, Cardinality, Changeset, ChangesetFn, ChangesetFnPtr, Clause, Condition,
    FieldDef, FieldErrors, FieldKind, Fragment, KeyStrategy, NumberRange, Operator, OrderItem,
    PageRequest, Pagination, Preload, Projection, Query, QueryOption, Schema, SortDirection,
    Source, SqlValue,
};

pub use contextkit_macros::{Schema, crud_context};

/// A namespace the generated accessors hang off.
pub trait Context {
    fn store(&self) -> &Store;
}
