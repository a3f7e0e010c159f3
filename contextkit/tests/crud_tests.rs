//! Integration tests for the data access verbs

mod common;

use assert_matches::assert_matches;
use common::{Item, Tag, attrs, catalog_with_items, reference, setup};
use contextkit::orm::repository;
use contextkit::{
    Attrs, ChangesetFn, Context, Error, Failure, OrderItem, QueryOption, Schema, SqlValue,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Create / update / delete
// ============================================================================

#[tokio::test]
async fn test_create_update_delete_round_trip() {
    let catalog = setup().await;

    let item = catalog
        .create_item(Item::default(), &attrs(json!({"reference": "widget", "cost": 12, "active": true})))
        .await
        .unwrap();
    assert!(item.id > 0);
    assert_eq!(item.reference, "widget");
    assert_eq!(item.cost, 12);
    assert!(item.active);
    assert_eq!(item.lock_version, 1);
    assert!(item.inserted_at.is_some());

    let failure = catalog
        .update_item(item.clone(), &attrs(json!({"cost": -5})))
        .await
        .unwrap_err();
    let changeset = assert_matches!(failure, Failure::Invalid(changeset) => changeset);
    assert_eq!(
        changeset.errors().get("cost"),
        ["must be greater than or equal to 0"]
    );

    let stored = catalog.get_item_or_fail(item.id, &[]).await.unwrap();
    assert_eq!(stored.cost, 12);

    let deleted = catalog.delete_item(stored.clone()).await.unwrap();
    assert_eq!(deleted.id, item.id);

    let again = catalog.delete_item(stored).await.unwrap_err();
    assert!(again.is_stale());
}

#[tokio::test]
async fn test_update_writes_changes_and_bumps_lock() {
    let catalog = catalog_with_items(3).await;
    let item = catalog.get_item_or_fail(2, &[]).await.unwrap();

    let updated = catalog
        .update_item(item.clone(), &attrs(json!({"cost": "41", "note": "restocked"})))
        .await
        .unwrap();
    assert_eq!(updated.cost, 41);
    assert_eq!(updated.note.as_deref(), Some("restocked"));
    assert_eq!(updated.lock_version, item.lock_version + 1);
    assert_eq!(updated.reference, item.reference);

    let stored = catalog.get_item_or_fail(2, &[]).await.unwrap();
    assert_eq!(stored.cost, 41);
    assert_eq!(stored.inserted_at, item.inserted_at);
}

#[tokio::test]
async fn test_update_without_changes_skips_the_store() {
    let catalog = catalog_with_items(1).await;
    let item = catalog.get_item_or_fail(1, &[]).await.unwrap();

    let same = catalog
        .update_item(item.clone(), &attrs(json!({"cost": item.cost})))
        .await
        .unwrap();

    assert_eq!(same, item);
    let stored = catalog.get_item_or_fail(1, &[]).await.unwrap();
    assert_eq!(stored.lock_version, item.lock_version);
}

#[tokio::test]
async fn test_concurrent_update_is_stale() {
    let catalog = catalog_with_items(1).await;
    let first = catalog.get_item_or_fail(1, &[]).await.unwrap();
    let second = first.clone();

    catalog
        .update_item(first, &attrs(json!({"cost": 7})))
        .await
        .unwrap();

    let failure = catalog
        .update_item(second, &attrs(json!({"cost": 8})))
        .await
        .unwrap_err();
    assert!(failure.is_stale());
    assert_eq!(failure.changeset().unwrap().get_change("cost"), Some(&json!(8)));

    let stored = catalog.get_item_or_fail(1, &[]).await.unwrap();
    assert_eq!(stored.cost, 7);
}

#[tokio::test]
async fn test_update_deleted_record_is_stale() {
    let catalog = catalog_with_items(1).await;
    let item = catalog.get_item_or_fail(1, &[]).await.unwrap();
    catalog.delete_item_or_fail(item.clone()).await.unwrap();

    let failure = catalog
        .update_item(item.clone(), &attrs(json!({"cost": 3})))
        .await
        .unwrap_err();
    assert!(failure.is_stale());

    let err = catalog
        .update_item_or_fail(item, &attrs(json!({"cost": 3})))
        .await
        .unwrap_err();
    assert_matches!(err, Error::StaleEntity);
}

#[tokio::test]
async fn test_create_validation_failures() {
    let catalog = setup().await;

    let failure = catalog
        .create_item(Item::default(), &attrs(json!({"cost": 3})))
        .await
        .unwrap_err();
    let changeset = assert_matches!(failure, Failure::Invalid(changeset) => changeset);
    assert_eq!(changeset.errors().get("reference"), ["can't be blank"]);

    let failure = catalog
        .create_item(Item::default(), &attrs(json!({"reference": "x", "cost": "lots"})))
        .await
        .unwrap_err();
    assert!(failure.is_invalid());
    assert_eq!(failure.changeset().unwrap().errors().get("cost"), ["is invalid"]);

    let err = catalog
        .create_item_or_fail(Item::default(), &attrs(json!({"reference": ""})))
        .await
        .unwrap_err();
    assert_matches!(err, Error::Validation(errors) if errors.contains("reference"));

    assert_eq!(catalog.count_items(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unique_violation_becomes_field_error() {
    let catalog = catalog_with_items(2).await;

    let failure = catalog
        .create_item(Item::default(), &attrs(json!({"reference": reference(1)})))
        .await
        .unwrap_err();

    let changeset = assert_matches!(failure, Failure::Invalid(changeset) => changeset);
    assert_eq!(changeset.errors().get("reference"), ["has already been taken"]);
}

#[tokio::test]
async fn test_delete_or_fail_twice() {
    let catalog = catalog_with_items(1).await;
    let item = catalog.get_item_or_fail(1, &[]).await.unwrap();

    catalog.delete_item_or_fail(item.clone()).await.unwrap();
    let err = catalog.delete_item_or_fail(item).await.unwrap_err();
    assert_matches!(err, Error::StaleEntity);
}

#[tokio::test]
async fn test_delete_unsaved_record_is_stale() {
    let catalog = setup().await;
    let failure = catalog.delete_item(Item::default()).await.unwrap_err();
    assert!(failure.is_stale());
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_get_missing_is_absent_or_not_found() {
    let catalog = catalog_with_items(3).await;

    assert_eq!(catalog.get_item(999, &[]).await.unwrap(), None);
    assert_matches!(
        catalog.get_item_or_fail(999, &[]).await,
        Err(Error::NotFound)
    );

    let found = catalog.get_item(3, &[]).await.unwrap().unwrap();
    assert_eq!(found.reference, reference(3));
}

#[tokio::test]
async fn test_get_ignores_pagination_window() {
    let catalog = catalog_with_items(10).await;

    let item = catalog
        .get_item(4, &[QueryOption::paginate(3, 5)])
        .await
        .unwrap();
    assert_eq!(item.map(|i| i.reference), Some(reference(4)));
}

#[tokio::test]
async fn test_get_by_clauses() {
    let catalog = catalog_with_items(30).await;

    let item = catalog
        .get_item_by(&[("reference", reference(7).into())], &[])
        .await
        .unwrap();
    assert_eq!(item.map(|i| i.cost), Some(7));

    // Clauses AND together
    let none = catalog
        .get_item_by(&[("cost", 3.into()), ("active", true.into())], &[])
        .await
        .unwrap();
    assert_eq!(none, None);

    // Several matches: the first one in the requested order
    let last = catalog
        .get_item_by(
            &[("cost", 3.into())],
            &[QueryOption::order_by(OrderItem::desc("reference"))],
        )
        .await
        .unwrap();
    assert_eq!(last.map(|i| i.reference), Some(reference(23)));
}

#[tokio::test]
async fn test_get_by_or_fail_requires_exactly_one() {
    let catalog = catalog_with_items(30).await;

    let err = catalog
        .get_item_by_or_fail(&[("cost", SqlValue::Int(3))], &[])
        .await
        .unwrap_err();
    assert_matches!(err, Error::MultipleResults);

    let err = catalog
        .get_item_by_or_fail(&[("reference", "missing".into())], &[])
        .await
        .unwrap_err();
    assert_matches!(err, Error::NotFound);

    let one = catalog
        .get_item_by_or_fail(&[("cost", 3.into()), ("reference", reference(13).into())], &[])
        .await
        .unwrap();
    assert_eq!(one.id, 13);
}

#[tokio::test]
async fn test_get_by_unknown_column_shape_matches_nothing() {
    let catalog = catalog_with_items(3).await;

    let item = catalog
        .get_item_by(&[("reference-x", "nope".into())], &[])
        .await
        .unwrap();
    assert_eq!(item, None);

    let err = catalog
        .get_item_by_or_fail(&[("reference;--", "nope".into())], &[])
        .await
        .unwrap_err();
    assert_matches!(err, Error::NotFound);

    // A well-formed clause next to a malformed one still finds nothing
    let mixed = repository::get_by::<Item>(
        catalog.store(),
        &[("id", 1.into()), ("cost) OR (1", 1.into())],
        &[],
    )
    .await
    .unwrap();
    assert_eq!(mixed, None);
}

// ============================================================================
// Changeset functions
// ============================================================================

#[tokio::test]
async fn test_named_and_direct_changeset_functions() {
    let catalog = catalog_with_items(1).await;
    let store = catalog.store();
    let item = catalog.get_item_or_fail(1, &[]).await.unwrap();

    // rename_changeset does not permit cost
    let renamed = repository::update(
        store,
        item.clone(),
        ChangesetFn::Named("rename_changeset"),
        &attrs(json!({"reference": "renamed", "cost": 99})),
    )
    .await
    .unwrap();
    assert_eq!(renamed.reference, "renamed");
    assert_eq!(renamed.cost, item.cost);

    let direct = repository::update(
        store,
        renamed,
        ChangesetFn::Func(Item::changeset),
        &attrs(json!({"cost": 99})),
    )
    .await
    .unwrap();
    assert_eq!(direct.cost, 99);

    let failure = repository::update(
        store,
        direct,
        ChangesetFn::Named("no_such_changeset"),
        &Attrs::new(),
    )
    .await
    .unwrap_err();
    assert_matches!(failure, Failure::Store(Error::UnknownChangeset(name)) if name == "no_such_changeset");
}

#[tokio::test]
async fn test_unregistered_default_changeset() {
    let catalog = setup().await;

    let failure = catalog
        .create_tag(Tag::default(), &attrs(json!({"label": "steel"})))
        .await
        .unwrap_err();
    assert_matches!(failure, Failure::Store(Error::UnknownChangeset(_)));
}

#[tokio::test]
async fn test_update_from_changeset_target() {
    let catalog = catalog_with_items(1).await;
    let item = catalog.get_item_or_fail(1, &[]).await.unwrap();

    let changeset = catalog
        .change_item(item, &attrs(json!({"note": "draft"})))
        .unwrap();
    assert!(changeset.is_valid());

    let updated = catalog
        .update_item(changeset, &attrs(json!({"cost": 5})))
        .await
        .unwrap();
    assert_eq!(updated.note.as_deref(), Some("draft"));
    assert_eq!(updated.cost, 5);
}

#[tokio::test]
async fn test_create_from_changeset_target() {
    let catalog = setup().await;

    let draft = catalog
        .change_item(Item::default(), &attrs(json!({"reference": "draft", "cost": 4})))
        .unwrap();
    assert!(draft.is_valid());

    let item = catalog
        .create_item(draft, &attrs(json!({"cost": 9})))
        .await
        .unwrap();
    assert_eq!(item.reference, "draft");
    assert_eq!(item.cost, 9);

    let stored = catalog.get_item_or_fail(item.id, &[]).await.unwrap();
    assert_eq!(stored.cost, 9);
}

// ============================================================================
// Pure construction
// ============================================================================

#[tokio::test]
async fn test_change_never_touches_store() {
    let catalog = catalog_with_items(1).await;
    let item = catalog.get_item_or_fail(1, &[]).await.unwrap();

    let changeset = catalog
        .change_item(item.clone(), &attrs(json!({"cost": -1, "reference": "other"})))
        .unwrap();
    assert!(!changeset.is_valid());
    assert_eq!(changeset.get_change("reference"), Some(&json!("other")));

    let blank = catalog.change_item(Item::default(), &Attrs::new()).unwrap();
    assert!(blank.errors().contains("reference"));

    let stored = catalog.get_item_or_fail(1, &[]).await.unwrap();
    assert_eq!(stored, item);
}

#[tokio::test]
async fn test_new_builds_unsaved_record() {
    let catalog = setup().await;

    let draft = catalog
        .new_item(
            &attrs(json!({"reference": "draft", "unknown": true})),
            &[QueryOption::preload("parts")],
        )
        .await
        .unwrap();

    assert_eq!(draft.id, 0);
    assert_eq!(draft.reference, "draft");
    assert!(draft.parts.is_empty());
    assert_eq!(catalog.count_items(&[]).await.unwrap(), 0);
}

// ============================================================================
// Keys and timestamps
// ============================================================================

#[tokio::test]
async fn test_uuid_keys_are_generated() {
    let catalog = setup().await;
    let store = catalog.store();

    let tag = repository::create(
        store,
        Tag::default(),
        ChangesetFn::Func(Tag::changeset),
        &attrs(json!({"part_id": 1, "label": "steel"})),
    )
    .await
    .unwrap();
    assert!(uuid::Uuid::parse_str(&tag.id).is_ok());

    let fetched: Tag = repository::get_or_fail(store, tag.id.as_str(), &[])
        .await
        .unwrap();
    assert_eq!(fetched, tag);

    let failure = repository::create(
        store,
        Tag::default(),
        ChangesetFn::Func(Tag::changeset),
        &attrs(json!({"part_id": 1, "label": "gold"})),
    )
    .await
    .unwrap_err();
    assert!(failure.is_invalid());
}

#[tokio::test]
async fn test_timestamps_are_maintained() {
    let catalog = catalog_with_items(1).await;
    let item = catalog.get_item_or_fail(1, &[]).await.unwrap();

    let inserted_at = item.inserted_at.clone().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(&inserted_at).is_ok());
    assert!(item.updated_at.is_some());

    let updated = catalog
        .update_item(item, &attrs(json!({"cost": 6})))
        .await
        .unwrap();
    assert_eq!(updated.inserted_at.as_deref(), Some(inserted_at.as_str()));
    let updated_at = updated.updated_at.unwrap();
    assert!(updated_at >= inserted_at);
}

#[test]
fn test_generated_table_sql() {
    let sql = Item::source().create_table_sql();
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS items"));
    assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
    assert!(sql.contains("note TEXT,") || sql.contains("note TEXT\n"));
    assert!(sql.contains("active INTEGER NOT NULL"));
}
