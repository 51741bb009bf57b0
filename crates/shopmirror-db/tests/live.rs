//! Live integration tests for shopmirror-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/shopmirror-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use shopmirror_core::{
    Address, Attribution, BundleComponent, CanonicalCoupon, CanonicalCustomer, CanonicalOrder,
    CanonicalOrderItem, CanonicalProduct, DateRange, OrderStatus, ProductKind,
};
use shopmirror_db::{
    get_customer, get_order, get_product, list_order_coupons, list_order_items, load_bundle_info,
    load_sale_lines, load_sales_with_bundles, resolve_family, set_cost_override, upsert_customer,
    upsert_order, upsert_product, DbError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal literal")
}

fn make_customer(id: i64, email: &str) -> CanonicalCustomer {
    CanonicalCustomer {
        id,
        email: Some(email.to_string()),
        username: Some(format!("user{id}")),
        display_name: None,
        first_name: Some("Ada".to_string()),
        last_name: Some("Martin".to_string()),
        role: Some("customer".to_string()),
        registered_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()),
        billing: Address {
            city: Some("Lyon".to_string()),
            country: Some("FR".to_string()),
            ..Address::default()
        },
        shipping: Address::default(),
        attribution: Attribution::default(),
        order_count: Some(1),
        total_spent: Some(dec("42.50")),
    }
}

fn make_product(id: i64, kind: ProductKind, parent_id: Option<i64>) -> CanonicalProduct {
    CanonicalProduct {
        id,
        kind,
        parent_id,
        title: format!("Product {id}"),
        slug: Some(format!("product-{id}")),
        status: "publish".to_string(),
        sku: None,
        regular_price: Some(dec("20.00")),
        sale_price: None,
        price: Some(dec("20.00")),
        cost: Some(dec("8.00")),
        stock_quantity: None,
        stock_status: "instock".to_string(),
        attributes: BTreeMap::new(),
        components: None,
        image_url: None,
        created_at: None,
        modified_at: None,
        variations: vec![],
    }
}

fn make_variable_product(parent_id: i64, variant_ids: &[i64]) -> CanonicalProduct {
    let mut parent = make_product(parent_id, ProductKind::VariableParent, None);
    parent.variations = variant_ids
        .iter()
        .map(|&id| {
            let mut v = make_product(id, ProductKind::Variant, Some(parent_id));
            v.attributes.insert("size".to_string(), format!("s{id}"));
            v
        })
        .collect();
    parent
}

fn make_item(product_id: i64, variant_id: Option<i64>, qty: i32, total: &str) -> CanonicalOrderItem {
    CanonicalOrderItem {
        source_item_id: None,
        name: format!("Item {product_id}"),
        product_id,
        variant_id,
        quantity: qty,
        unit_price: None,
        line_subtotal: Some(dec(total)),
        line_total: dec(total),
        line_tax: None,
        unit_cost: None,
    }
}

fn make_order(id: i64, status: OrderStatus, items: Vec<CanonicalOrderItem>) -> CanonicalOrder {
    CanonicalOrder {
        id,
        status,
        currency: "EUR".to_string(),
        total: Some(items.iter().map(|i| i.line_total).sum()),
        subtotal: None,
        total_tax: None,
        shipping_total: None,
        discount_total: None,
        customer_id: Some(7),
        billing: Address {
            city: Some("Paris".to_string()),
            country: Some("FR".to_string()),
            ..Address::default()
        },
        shipping: Address::default(),
        payment_method: Some("stripe".to_string()),
        payment_method_title: None,
        transaction_id: None,
        attribution: Attribution::default(),
        created_at: Some(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()),
        modified_at: None,
        paid_at: None,
        completed_at: None,
        items,
        coupons: vec![],
    }
}

async fn count(pool: &sqlx::PgPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count query failed ({sql}): {e}"))
}

// ---------------------------------------------------------------------------
// Section 1: Customers
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn customer_upsert_reports_insert_then_update(pool: sqlx::PgPool) {
    let customer = make_customer(7, "ada@example.com");

    let first = upsert_customer(&pool, &customer)
        .await
        .expect("first upsert failed");
    let second = upsert_customer(&pool, &customer)
        .await
        .expect("second upsert failed");

    assert!(first.was_inserted);
    assert!(!second.was_inserted);
    assert_eq!(first.id, 7);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM customers").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn customer_resync_replaces_fields(pool: sqlx::PgPool) {
    upsert_customer(&pool, &make_customer(7, "old@example.com"))
        .await
        .expect("initial upsert failed");

    let mut changed = make_customer(7, "new@example.com");
    changed.billing.city = None;
    changed.order_count = None;
    upsert_customer(&pool, &changed)
        .await
        .expect("re-sync failed");

    let row = get_customer(&pool, 7)
        .await
        .expect("get_customer failed")
        .expect("customer missing");
    assert_eq!(row.email.as_deref(), Some("new@example.com"));
    assert_eq!(row.order_count, None);
    assert!(row.billing.get("city").is_some_and(serde_json::Value::is_null));
    assert_eq!(row.billing["country"], "FR");
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_customer_returns_none_for_unknown_id(pool: sqlx::PgPool) {
    let row = get_customer(&pool, 404).await.expect("query failed");
    assert!(row.is_none());
}

// ---------------------------------------------------------------------------
// Section 2: Products and families
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn product_with_variations_is_written_together(pool: sqlx::PgPool) {
    let outcome = upsert_product(&pool, &make_variable_product(100, &[102, 101]))
        .await
        .expect("upsert_product failed");

    assert!(outcome.was_inserted);
    assert_eq!(outcome.children_written, 2);

    let variant = get_product(&pool, 101)
        .await
        .expect("get_product failed")
        .expect("variant missing");
    assert_eq!(variant.kind, "variant");
    assert_eq!(variant.parent_id, Some(100));
    assert_eq!(variant.attributes["size"], "s101");
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_variation_rolls_back_parent(pool: sqlx::PgPool) {
    let mut parent = make_variable_product(100, &[101]);
    // A variant must have a parent; the CHECK constraint rejects this one.
    parent.variations[0].parent_id = None;

    let err = upsert_product(&pool, &parent)
        .await
        .expect_err("invalid variation should fail");

    assert!(matches!(err, DbError::ConflictWrite { entity: "product", id: 101, .. }));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM products").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn family_is_identical_from_parent_or_any_variant(pool: sqlx::PgPool) {
    upsert_product(&pool, &make_variable_product(100, &[103, 101, 102]))
        .await
        .expect("upsert_product failed");

    let from_parent = resolve_family(&pool, 100)
        .await
        .expect("resolve from parent failed")
        .expect("family missing");
    let from_variant = resolve_family(&pool, 102)
        .await
        .expect("resolve from variant failed")
        .expect("family missing");

    assert_eq!(from_parent.parent.id, 100);
    assert_eq!(from_parent.variant_ids(), vec![101, 102, 103]);
    assert_eq!(from_parent.all_ids(), from_variant.all_ids());
    assert_eq!(from_parent.all_ids(), vec![100, 101, 102, 103]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn simple_product_is_its_own_family(pool: sqlx::PgPool) {
    upsert_product(&pool, &make_product(5, ProductKind::Simple, None))
        .await
        .expect("upsert_product failed");

    let family = resolve_family(&pool, 5)
        .await
        .expect("resolve failed")
        .expect("family missing");
    assert_eq!(family.all_ids(), vec![5]);
    assert!(family.variants.is_empty());

    assert!(resolve_family(&pool, 999).await.expect("resolve failed").is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn cost_override_survives_product_resync(pool: sqlx::PgPool) {
    let product = make_product(5, ProductKind::Simple, None);
    upsert_product(&pool, &product).await.expect("upsert failed");

    assert!(set_cost_override(&pool, 5, Some(dec("3.25")))
        .await
        .expect("set_cost_override failed"));
    assert!(!set_cost_override(&pool, 404, Some(dec("1.00")))
        .await
        .expect("set_cost_override failed"));

    let second = upsert_product(&pool, &product).await.expect("re-sync failed");
    assert!(!second.was_inserted);

    let row = get_product(&pool, 5)
        .await
        .expect("get_product failed")
        .expect("product missing");
    assert_eq!(row.cost_override, Some(dec("3.25")));
    assert_eq!(row.effective_cost(), Some(dec("3.25")));
}

// ---------------------------------------------------------------------------
// Section 3: Orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn order_resync_replaces_items_and_coupons(pool: sqlx::PgPool) {
    let mut order = make_order(
        1001,
        OrderStatus::Processing,
        vec![
            make_item(5, None, 1, "20.00"),
            make_item(6, None, 2, "30.00"),
            make_item(7, None, 1, "10.00"),
        ],
    );
    order.coupons = vec![CanonicalCoupon {
        code: "WELCOME".to_string(),
        discount: Some(dec("5.00")),
        discount_type: Some("fixed_cart".to_string()),
    }];

    let first = upsert_order(&pool, &order).await.expect("insert failed");
    assert!(first.was_inserted);
    assert_eq!(first.items_inserted, 3);
    assert_eq!(first.coupons_inserted, 1);

    order.status = OrderStatus::Completed;
    order.items.truncate(2);
    order.coupons.clear();
    let second = upsert_order(&pool, &order).await.expect("update failed");
    assert!(!second.was_inserted);
    assert_eq!(second.items_inserted, 2);

    let items = list_order_items(&pool, 1001).await.expect("list items failed");
    assert_eq!(items.len(), 2);
    assert!(list_order_coupons(&pool, 1001)
        .await
        .expect("list coupons failed")
        .is_empty());

    let row = get_order(&pool, 1001)
        .await
        .expect("get_order failed")
        .expect("order missing");
    assert_eq!(row.status, "completed");
}

#[sqlx::test(migrations = "../../migrations")]
async fn identical_order_twice_yields_identical_state(pool: sqlx::PgPool) {
    let order = make_order(
        1001,
        OrderStatus::Completed,
        vec![make_item(5, None, 1, "20.00"), make_item(6, None, 2, "30.00")],
    );

    upsert_order(&pool, &order).await.expect("first write failed");
    let before: Vec<(i64, i32, Decimal)> = list_order_items(&pool, 1001)
        .await
        .expect("list failed")
        .into_iter()
        .map(|i| (i.product_id, i.quantity, i.line_total))
        .collect();

    let again = upsert_order(&pool, &order).await.expect("second write failed");
    let after: Vec<(i64, i32, Decimal)> = list_order_items(&pool, 1001)
        .await
        .expect("list failed")
        .into_iter()
        .map(|i| (i.product_id, i.quantity, i.line_total))
        .collect();

    assert!(!again.was_inserted);
    assert_eq!(before, after);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orders").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_item_rolls_back_new_order(pool: sqlx::PgPool) {
    let mut items: Vec<_> = (0..5).map(|n| make_item(10 + n, None, 1, "5.00")).collect();
    // NUMERIC(12,2) cannot hold this value.
    items[2].line_total = dec("100000000000.00");
    let order = make_order(2002, OrderStatus::Completed, items);

    let err = upsert_order(&pool, &order)
        .await
        .expect_err("overflowing item should fail the order");

    assert!(matches!(err, DbError::ConflictWrite { entity: "order", id: 2002, .. }));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orders").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM order_items").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_item_keeps_previous_version(pool: sqlx::PgPool) {
    let mut good = make_order(
        2002,
        OrderStatus::Processing,
        vec![make_item(5, None, 1, "20.00"), make_item(6, None, 1, "15.00")],
    );
    good.coupons = vec![CanonicalCoupon {
        code: "WELCOME".to_string(),
        discount: Some(dec("3.00")),
        discount_type: Some("fixed_cart".to_string()),
    }];
    upsert_order(&pool, &good).await.expect("initial write failed");

    let mut items: Vec<_> = (0..5).map(|n| make_item(10 + n, None, 1, "5.00")).collect();
    items[2].line_total = dec("100000000000.00");
    let mut bad = make_order(2002, OrderStatus::Completed, items);
    bad.currency = "USD".to_string();

    upsert_order(&pool, &bad)
        .await
        .expect_err("overflowing item should fail the order");

    let row = get_order(&pool, 2002)
        .await
        .expect("get_order failed")
        .expect("order missing");
    assert_eq!(row.status, "processing");
    assert_eq!(row.currency, "EUR");
    let items = list_order_items(&pool, 2002).await.expect("list failed");
    assert_eq!(items.len(), 2);
    let coupons = list_order_coupons(&pool, 2002)
        .await
        .expect("list coupons failed");
    assert_eq!(coupons.len(), 1);
    assert_eq!(coupons[0].code, "WELCOME");
    assert_eq!(coupons[0].discount, Some(dec("3.00")));
}

#[sqlx::test(migrations = "../../migrations")]
async fn item_cost_snapshots_effective_product_cost(pool: sqlx::PgPool) {
    upsert_product(&pool, &make_variable_product(100, &[101]))
        .await
        .expect("upsert_product failed");
    set_cost_override(&pool, 101, Some(dec("2.50")))
        .await
        .expect("set_cost_override failed");

    let mut with_payload_cost = make_item(100, Some(101), 1, "20.00");
    with_payload_cost.unit_cost = Some(dec("9.99"));
    let order = make_order(
        3003,
        OrderStatus::Completed,
        vec![
            make_item(100, Some(101), 2, "40.00"),
            with_payload_cost,
            make_item(555, None, 1, "1.00"),
        ],
    );
    upsert_order(&pool, &order).await.expect("upsert_order failed");

    let costs: Vec<Option<Decimal>> = list_order_items(&pool, 3003)
        .await
        .expect("list failed")
        .into_iter()
        .map(|i| i.unit_cost)
        .collect();
    assert_eq!(costs, vec![Some(dec("2.50")), Some(dec("9.99")), None]);

    // Later override changes do not rewrite history.
    set_cost_override(&pool, 101, Some(dec("4.00")))
        .await
        .expect("set_cost_override failed");
    let first = &list_order_items(&pool, 3003).await.expect("list failed")[0];
    assert_eq!(first.unit_cost, Some(dec("2.50")));
}

// ---------------------------------------------------------------------------
// Section 4: Sale-line reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn sale_lines_cover_completed_orders_with_siblings(pool: sqlx::PgPool) {
    upsert_order(
        &pool,
        &make_order(
            1,
            OrderStatus::Completed,
            vec![make_item(5, None, 1, "20.00"), make_item(9, None, 1, "4.00")],
        ),
    )
    .await
    .expect("write failed");
    upsert_order(
        &pool,
        &make_order(2, OrderStatus::Cancelled, vec![make_item(5, None, 1, "20.00")]),
    )
    .await
    .expect("write failed");
    upsert_order(
        &pool,
        &make_order(3, OrderStatus::Completed, vec![make_item(8, None, 1, "3.00")]),
    )
    .await
    .expect("write failed");

    let lines = load_sale_lines(&pool, &[5], DateRange::default())
        .await
        .expect("load_sale_lines failed");

    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.order_id == 1));
    assert!(lines.iter().any(|l| l.product_id == 9));
    assert_eq!(lines[0].billing_country.as_deref(), Some("FR"));

    assert!(load_sale_lines(&pool, &[], DateRange::default())
        .await
        .expect("load_sale_lines failed")
        .is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn sale_lines_respect_date_range(pool: sqlx::PgPool) {
    upsert_order(
        &pool,
        &make_order(1, OrderStatus::Completed, vec![make_item(5, None, 1, "20.00")]),
    )
    .await
    .expect("write failed");

    let after = DateRange {
        from: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        to: None,
    };
    let lines = load_sale_lines(&pool, &[5], after)
        .await
        .expect("load_sale_lines failed");
    assert!(lines.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn bundle_info_reads_stored_compositions(pool: sqlx::PgPool) {
    let mut bundle = make_product(50, ProductKind::Bundle, None);
    bundle.components = Some(vec![
        BundleComponent {
            component_id: 5,
            quantity: 1,
        },
        BundleComponent {
            component_id: 6,
            quantity: 2,
        },
    ]);
    upsert_product(&pool, &bundle).await.expect("upsert failed");
    upsert_product(&pool, &make_product(5, ProductKind::Simple, None))
        .await
        .expect("upsert failed");

    let info = load_bundle_info(&pool, &[50, 5, 404])
        .await
        .expect("load_bundle_info failed");

    assert_eq!(info.components_of(50), Some(&[5, 6][..]));
    assert!(info.components_of(5).is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn sales_with_bundles_loads_compositions_of_sibling_bundles(pool: sqlx::PgPool) {
    let mut bundle = make_product(50, ProductKind::Bundle, None);
    bundle.components = Some(vec![BundleComponent {
        component_id: 5,
        quantity: 1,
    }]);
    upsert_product(&pool, &bundle).await.expect("upsert failed");

    upsert_order(
        &pool,
        &make_order(
            1,
            OrderStatus::Completed,
            vec![make_item(50, None, 1, "30.00"), make_item(5, None, 1, "0")],
        ),
    )
    .await
    .expect("upsert failed");

    let (lines, bundles) = load_sales_with_bundles(&pool, &[5], DateRange::default())
        .await
        .expect("load failed");

    assert_eq!(lines.len(), 2);
    assert_eq!(bundles.components_of(50), Some(&[5][..]));
}
