//! Integration tests for option compilation against a real store
//!
//! Dataset: 100 items, `item_001..item_100`, cost `i % 10`, even items active.

mod common;

use common::{Item, catalog_with_items, reference};
use contextkit::orm::{options, repository};
use contextkit::{
    Condition, Context, Fragment, Operator, OrderItem, Projection, Query, QueryOption,
    SortDirection, SqlValue,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn reference_is(op: Operator, value: &str) -> QueryOption {
    QueryOption::filter(Condition::compare("reference", op, value))
}

// ============================================================================
// Comparison operators
// ============================================================================

#[tokio::test]
async fn test_comparison_operators_on_reference() {
    let catalog = catalog_with_items(100).await;

    let cases = [
        (Operator::Gt, 10),
        (Operator::Ge, 11),
        (Operator::Lt, 89),
        (Operator::Le, 90),
        (Operator::Eq, 1),
    ];

    for (op, expected) in cases {
        let items = catalog
            .list_items(&[reference_is(op, "item_090")])
            .await
            .unwrap();
        assert_eq!(items.len(), expected, "operator {op:?}");
    }
}

#[tokio::test]
async fn test_between_is_inclusive() {
    let catalog = catalog_with_items(100).await;

    let items = catalog
        .list_items(&[QueryOption::filter(Condition::between(
            "reference",
            "item_090",
            "item_095",
        ))])
        .await
        .unwrap();

    assert_eq!(items.len(), 6);
}

#[tokio::test]
async fn test_where_or_where_combination() {
    let catalog = catalog_with_items(100).await;
    let between = QueryOption::filter(Condition::between("reference", "item_090", "item_095"));
    let first = QueryOption::or_filter(Condition::eq("reference", "item_001"));

    let items = catalog
        .list_items(&[between.clone(), first.clone()])
        .await
        .unwrap();
    assert_eq!(items.len(), 7);

    // Same groups regardless of option order
    let reversed = catalog.list_items(&[first, between]).await.unwrap();
    assert_eq!(reversed.len(), 7);
}

#[tokio::test]
async fn test_where_group_is_and_or_where_group_is_or() {
    let catalog = catalog_with_items(100).await;

    // (cost = 3 AND active) OR (reference = item_001 OR reference = item_002)
    // cost 3 items are all odd, so the AND group is empty
    let opts = [
        QueryOption::Where(vec![Condition::eq("cost", 3), Condition::eq("active", true)]),
        QueryOption::OrWhere(vec![
            Condition::eq("reference", "item_001"),
            Condition::eq("reference", "item_002"),
        ]),
    ];

    let mut refs: Vec<String> = catalog
        .list_items(&opts)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.reference)
        .collect();
    refs.sort();
    assert_eq!(refs, vec!["item_001", "item_002"]);

    // Sequential where options keep AND-ing
    let narrowed = catalog
        .list_items(&[
            QueryOption::filter(Condition::eq("cost", 4)),
            QueryOption::filter(Condition::eq("active", true)),
        ])
        .await
        .unwrap();
    assert_eq!(narrowed.len(), 10);
}

#[tokio::test]
async fn test_like_is_case_sensitive_and_ilike_is_not() {
    let catalog = catalog_with_items(100).await;

    let count = |op: Operator, pattern: &'static str| {
        let catalog = &catalog;
        async move {
            catalog
                .count_items(&[reference_is(op, pattern)])
                .await
                .unwrap()
        }
    };

    assert_eq!(count(Operator::Like, "item_00%").await, 9);
    assert_eq!(count(Operator::Like, "ITEM_00%").await, 0);
    assert_eq!(count(Operator::ILike, "ITEM_00%").await, 9);
    // `_` matches exactly one character
    assert_eq!(count(Operator::Like, "item_0_0").await, 9);
}

#[tokio::test]
async fn test_null_equality_and_native_fragment() {
    let catalog = catalog_with_items(100).await;

    let without_note = catalog
        .count_items(&[QueryOption::filter(Condition::eq("note", SqlValue::Null))])
        .await
        .unwrap();
    assert_eq!(without_note, 100);

    let expensive = catalog
        .count_items(&[QueryOption::filter(Condition::fragment(
            Fragment::new("cost * 2 > ?").bind(16),
        ))])
        .await
        .unwrap();
    assert_eq!(expensive, 10);
}

// ============================================================================
// Permissive compilation
// ============================================================================

#[tokio::test]
async fn test_misspelled_operator_is_silently_ignored() {
    // The permissive policy masks typos: the filter simply vanishes.
    let catalog = catalog_with_items(100).await;

    let items = catalog
        .list_items(&[QueryOption::filter(Condition::parse(
            "reference",
            "greter_than",
            vec!["item_090".into()],
        ))])
        .await
        .unwrap();

    assert_eq!(items.len(), 100);
}

#[tokio::test]
async fn test_unrecognized_shapes_are_no_ops() {
    let catalog = catalog_with_items(20).await;

    let items = catalog
        .list_items(&[
            QueryOption::Unrecognized("group_by".into()),
            QueryOption::filter(Condition::eq("reference; DROP TABLE items", 1)),
            QueryOption::order_by(OrderItem::asc("cost desc")),
            QueryOption::Paginate(contextkit::PageRequest {
                page: Some(0),
                per_page: Some(5),
            }),
        ])
        .await
        .unwrap();

    assert_eq!(items.len(), 20);
}

#[test]
fn test_compile_absent_base_stays_absent() {
    assert_eq!(options::compile(None, &[QueryOption::paginate(1, 5)]), None);

    let compiled = options::compile(Some(Query::new()), &[QueryOption::paginate(3, 5)]).unwrap();
    assert_eq!(compiled.offset_value(), Some(10));
    assert_eq!(compiled.limit_value(), Some(5));
}

// ============================================================================
// Sorting and projection
// ============================================================================

#[tokio::test]
async fn test_order_by_direction() {
    let catalog = catalog_with_items(100).await;

    let asc = catalog
        .list_items(&[QueryOption::order_by(OrderItem::asc("reference"))])
        .await
        .unwrap();
    assert_eq!(asc[0].reference, "item_001");

    let desc = catalog
        .list_items(&[QueryOption::order_by(OrderItem::desc("reference"))])
        .await
        .unwrap();
    assert_eq!(desc[0].reference, "item_100");
}

#[tokio::test]
async fn test_multi_key_order_is_preserved() {
    let catalog = catalog_with_items(30).await;

    let items = catalog
        .list_items(&[QueryOption::OrderBy(vec![
            OrderItem::desc("cost"),
            OrderItem::new("reference", SortDirection::Asc),
        ])])
        .await
        .unwrap();

    let head: Vec<&str> = items.iter().take(3).map(|i| i.reference.as_str()).collect();
    assert_eq!(head, vec!["item_009", "item_019", "item_029"]);
}

#[tokio::test]
async fn test_nulls_first_and_last() {
    let catalog = catalog_with_items(3).await;
    let item = catalog.get_item_by_or_fail(&[("reference", reference(2).into())], &[]).await.unwrap();
    catalog
        .update_item_or_fail(item, &common::attrs(json!({"note": "flagged"})))
        .await
        .unwrap();

    let nulls_first = catalog
        .list_items(&[QueryOption::order_by(OrderItem::new(
            "note",
            SortDirection::AscNullsFirst,
        ))])
        .await
        .unwrap();
    assert_eq!(nulls_first.last().unwrap().reference, reference(2));

    let nulls_last = catalog
        .list_items(&[QueryOption::order_by(OrderItem::new(
            "note",
            SortDirection::AscNullsLast,
        ))])
        .await
        .unwrap();
    assert_eq!(nulls_last[0].reference, reference(2));
}

#[tokio::test]
async fn test_select_returns_partial_records() {
    let catalog = catalog_with_items(100).await;

    let items = catalog
        .list_items(&[
            QueryOption::select(["reference"]),
            QueryOption::order_by(OrderItem::asc("reference")),
        ])
        .await
        .unwrap();

    assert_eq!(items[0].reference, "item_001");
    assert_eq!(items[0].id, 0);
    assert_eq!(items[0].lock_version, 0);
    assert_eq!(items[0].inserted_at, None);
}

#[tokio::test]
async fn test_select_native_projection() {
    let catalog = catalog_with_items(5).await;

    let items: Vec<Item> = repository::list(
        catalog.store(),
        &[
            QueryOption::Select(Projection::Fragment("id, upper(reference) AS reference".into())),
            QueryOption::order_by(OrderItem::asc("id")),
        ],
    )
    .await
    .unwrap();

    assert_eq!(items[0].reference, "ITEM_001");
}

// ============================================================================
// Count and JSON options
// ============================================================================

#[tokio::test]
async fn test_count_ignores_projection_order_and_window() {
    let catalog = catalog_with_items(100).await;

    let count = catalog
        .count_items(&[
            reference_is(Operator::Gt, "item_050"),
            QueryOption::select(["reference"]),
            QueryOption::order_by(OrderItem::desc("reference")),
            QueryOption::paginate(2, 7),
        ])
        .await
        .unwrap();

    assert_eq!(count, 50);
}

#[tokio::test]
async fn test_json_option_list() {
    let catalog = catalog_with_items(100).await;

    let opts = options::from_json(&json!([
        ["where", ["reference", "between", "item_090", "item_095"]],
        ["or_where", {"reference": "item_001"}],
        ["order_by", [["desc", "reference"]]],
        ["having", "anything"],
    ]));

    let items = catalog.list_items(&opts).await.unwrap();
    assert_eq!(items.len(), 7);
    assert_eq!(items[0].reference, "item_095");
    assert_eq!(items[6].reference, "item_001");
}
