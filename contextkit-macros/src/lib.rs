//! Procedural macros for contextkit
//!
//! This crate removes the per-record boilerplate of the data access layer:
//!
//! - `#[derive(Schema)]` - Describe a record's table, columns and associations
//! - `crud_context!` - Generate CRUD accessors for a record on a context type

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod context;
mod schema;

/// Implement `contextkit::Schema` for a struct with named fields.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Serialize, Deserialize, Schema)]
/// #[serde(default)]
/// #[schema(table = "items", lock = "lock_version", timestamps, changesets(changeset))]
/// pub struct Item {
///     pub id: i64,
///     pub reference: String,
///     pub cost: i64,
///     pub lock_version: i64,
///     #[schema(kind = "json")]
///     pub labels: Labels,
///     #[has_many(foreign_key = "item_id")]
///     pub parts: Vec<Part>,
///     #[belongs_to(foreign_key = "owner_id")]
///     pub owner: Option<Owner>,
/// }
/// ```
///
/// Container attributes (all optional):
///
/// - `table = "..."` - defaults to the snake_case type name plus `s`
/// - `primary_key = "..."` - defaults to `id`
/// - `key = "autoincrement" | "uuid" | "manual"` - defaults to
///   `autoincrement` for integer keys and `uuid` otherwise
/// - `lock = "..."` - integer optimistic-lock column
/// - `timestamps` - maintain `inserted_at` / `updated_at`
/// - `changesets(a, b)` - associated fns resolvable by name
///
/// Column kinds are inferred from the field type unless given with
/// `#[schema(kind = "...")]`; `#[schema(skip)]` leaves a field out.
#[proc_macro_derive(Schema, attributes(schema, has_many, has_one, belongs_to))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    schema::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Generate CRUD accessors for a schema on a context type.
///
/// # Usage
///
/// ```ignore
/// crud_context!(Catalog, Item);
/// crud_context!(Catalog, Person, singular = person, plural = people);
/// crud_context!(Catalog, Item, changeset = Item::admin_changeset);
/// ```
///
/// # Generated Code
///
/// For `crud_context!(Catalog, Item)`, inherent methods on `Catalog`
/// forwarding to `contextkit::orm::repository` with the store from
/// `contextkit::Context::store`:
///
/// ```ignore
/// impl Catalog {
///     pub async fn list_items(&self, opts: &[QueryOption]) -> Result<Vec<Item>>;
///     pub async fn list_items_paginated(&self, opts: &[QueryOption]) -> Result<Pagination<Item>>;
///     pub async fn count_items(&self, opts: &[QueryOption]) -> Result<i64>;
///     pub async fn get_item(&self, id, opts) -> Result<Option<Item>>;
///     pub async fn get_item_or_fail(&self, id, opts) -> Result<Item>;
///     pub async fn get_item_by(&self, clauses, opts) -> Result<Option<Item>>;
///     pub async fn get_item_by_or_fail(&self, clauses, opts) -> Result<Item>;
///     pub async fn create_item(&self, target, attrs) -> Result<Item, Failure<Item>>;
///     pub async fn create_item_or_fail(&self, target, attrs) -> Result<Item>;
///     pub async fn update_item(&self, target, attrs) -> Result<Item, Failure<Item>>;
///     pub async fn update_item_or_fail(&self, target, attrs) -> Result<Item>;
///     pub async fn delete_item(&self, target) -> Result<Item, Failure<Item>>;
///     pub async fn delete_item_or_fail(&self, target) -> Result<Item>;
///     pub fn change_item(&self, target, attrs) -> Result<Changeset<Item>>;
///     pub async fn new_item(&self, attrs, opts) -> Result<Item>;
/// }
/// ```
///
/// Write targets are anything convertible into a `Changeset`: a fresh
/// `Item::default()`, a loaded record, or a changeset built earlier.
///
/// The changeset function defaults to the one registered as `changeset`
/// through `#[schema(changesets(...))]`.
#[proc_macro]
pub fn crud_context(input: TokenStream) -> TokenStream {
    let parsed = parse_macro_input!(input as context::CrudContextInput);
    context::expand(parsed)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
