//! Shared fixtures for the integration tests
//!
//! `items` carry a lock version and timestamps; `parts` belong to items and
//! own `tags`, which use UUID keys.

#![allow(dead_code)]

use contextkit::{Attrs, Changeset, Context, NumberRange, Schema, Store, crud_context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Schema)]
#[serde(default)]
#[schema(
    table = "items",
    lock = "lock_version",
    timestamps,
    changesets(changeset, rename_changeset)
)]
pub struct Item {
    pub id: i64,
    pub reference: String,
    pub cost: i64,
    pub active: bool,
    pub note: Option<String>,
    pub lock_version: i64,
    pub inserted_at: Option<String>,
    pub updated_at: Option<String>,
    #[has_many(foreign_key = "item_id")]
    pub parts: Vec<Part>,
}

impl Item {
    pub fn changeset(changeset: Changeset<Self>, attrs: &Attrs) -> Changeset<Self> {
        changeset
            .cast(attrs, &["reference", "cost", "active", "note"])
            .validate_required(&["reference"])
            .validate_number("cost", NumberRange::at_least(0.0))
            .unique_constraint("reference")
    }

    /// Only the reference may change.
    pub fn rename_changeset(changeset: Changeset<Self>, attrs: &Attrs) -> Changeset<Self> {
        changeset
            .cast(attrs, &["reference"])
            .validate_required(&["reference"])
            .validate_length("reference", Some(3), Some(32))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Schema)]
#[serde(default)]
#[schema(table = "parts")]
pub struct Part {
    pub id: i64,
    pub item_id: i64,
    pub name: String,
    #[belongs_to(foreign_key = "item_id")]
    pub item: Option<Box<Item>>,
    #[has_many(foreign_key = "part_id")]
    pub tags: Vec<Tag>,
}

impl Part {
    pub fn changeset(changeset: Changeset<Self>, attrs: &Attrs) -> Changeset<Self> {
        changeset
            .cast(attrs, &["item_id", "name"])
            .validate_required(&["item_id", "name"])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Schema)]
#[serde(default)]
pub struct Tag {
    pub id: String,
    pub part_id: i64,
    pub label: String,
}

impl Tag {
    pub fn changeset(changeset: Changeset<Self>, attrs: &Attrs) -> Changeset<Self> {
        changeset
            .cast(attrs, &["part_id", "label"])
            .validate_inclusion("label", &["steel", "brass", "spare"])
    }
}

pub struct Catalog {
    store: Store,
}

impl Context for Catalog {
    fn store(&self) -> &Store {
        &self.store
    }
}

crud_context!(Catalog, Item);
crud_context!(Catalog, Part, changeset = Part::changeset);
// No changeset registered by name: create_tag / update_tag fail to resolve
crud_context!(Catalog, Tag);

pub fn attrs(value: Value) -> Attrs {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn reference(n: usize) -> String {
    format!("item_{:03}", n)
}

/// Fresh in-memory catalog with all tables created.
pub async fn setup() -> Catalog {
    let store = Store::in_memory().await.expect("in-memory store");
    setup_with(store).await
}

pub async fn setup_with(store: Store) -> Catalog {
    for source in [Item::source(), Part::source(), Tag::source()] {
        store
            .execute(&source.create_table_sql())
            .await
            .expect("create table");
    }
    store
        .execute("CREATE UNIQUE INDEX IF NOT EXISTS items_reference_index ON items (reference)")
        .await
        .expect("create index");

    Catalog { store }
}

/// `item_001..item_{n}`; cost is `i % 10`, every even item is active.
pub async fn seed_items(catalog: &Catalog, n: usize) -> Vec<Item> {
    let mut items = Vec::with_capacity(n);
    for i in 1..=n {
        let item = catalog
            .create_item_or_fail(Item::default(), &attrs(serde_json::json!({
                "reference": reference(i),
                "cost": i % 10,
                "active": i % 2 == 0,
            })))
            .await
            .expect("seed item");
        items.push(item);
    }
    items
}

pub async fn catalog_with_items(n: usize) -> Catalog {
    let catalog = setup().await;
    seed_items(&catalog, n).await;
    catalog
}
