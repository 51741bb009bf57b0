//! Database operations for `orders`, `order_items`, and `order_coupons`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopmirror_core::{CanonicalCoupon, CanonicalOrder, CanonicalOrderItem};
use sqlx::{types::Json, PgPool, Postgres, Transaction};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub status: String,
    pub currency: String,
    pub total: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub total_tax: Option<Decimal>,
    pub shipping_total: Option<Decimal>,
    pub discount_total: Option<Decimal>,
    pub customer_id: Option<i64>,
    pub billing: serde_json::Value,
    pub shipping: serde_json::Value,
    pub payment_method: Option<String>,
    pub payment_method_title: Option<String>,
    pub transaction_id: Option<String>,
    pub attribution: serde_json::Value,
    pub source_created_at: Option<DateTime<Utc>>,
    pub source_modified_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `order_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub source_item_id: Option<i64>,
    pub name: String,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub line_subtotal: Option<Decimal>,
    pub line_total: Decimal,
    pub line_tax: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
}

/// A row from the `order_coupons` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderCouponRow {
    pub id: i64,
    pub order_id: i64,
    pub code: String,
    pub discount: Option<Decimal>,
    pub discount_type: Option<String>,
}

/// Result of writing one order with its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderUpsertOutcome {
    pub id: i64,
    pub was_inserted: bool,
    pub items_inserted: u64,
    pub coupons_inserted: u64,
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

/// Writes an order, its items, and its coupons as one unit.
///
/// On update the previous items and coupons are deleted and replaced, so
/// the stored children always mirror the latest payload. Items without a
/// payload cost snapshot the effective cost (`cost_override`, else `cost`)
/// of their variant, falling back to their product.
///
/// Any failure rolls the whole order back, leaving the previously stored
/// version (or nothing) in place.
///
/// # Errors
///
/// Returns [`DbError::ConflictWrite`] for the order if any statement fails.
pub async fn upsert_order(
    pool: &PgPool,
    order: &CanonicalOrder,
) -> Result<OrderUpsertOutcome, DbError> {
    let on_err = || DbError::write("order", order.id);

    let mut tx = pool.begin().await.map_err(on_err())?;

    let was_inserted = upsert_order_row(&mut tx, order)
        .await
        .map_err(on_err())?;

    if !was_inserted {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .map_err(on_err())?;
        sqlx::query("DELETE FROM order_coupons WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .map_err(on_err())?;
    }

    let mut items_inserted = 0u64;
    for item in &order.items {
        insert_item(&mut tx, order.id, item)
            .await
            .map_err(on_err())?;
        items_inserted += 1;
    }

    let mut coupons_inserted = 0u64;
    for coupon in &order.coupons {
        insert_coupon(&mut tx, order.id, coupon)
            .await
            .map_err(on_err())?;
        coupons_inserted += 1;
    }

    tx.commit().await.map_err(on_err())?;

    Ok(OrderUpsertOutcome {
        id: order.id,
        was_inserted,
        items_inserted,
        coupons_inserted,
    })
}

async fn upsert_order_row(
    tx: &mut Transaction<'_, Postgres>,
    order: &CanonicalOrder,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "INSERT INTO orders \
             (id, status, currency, total, subtotal, total_tax, shipping_total, \
              discount_total, customer_id, billing, shipping, payment_method, \
              payment_method_title, transaction_id, attribution, source_created_at, \
              source_modified_at, paid_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 $17, $18, $19) \
         ON CONFLICT (id) DO UPDATE SET \
             status               = EXCLUDED.status, \
             currency             = EXCLUDED.currency, \
             total                = EXCLUDED.total, \
             subtotal             = EXCLUDED.subtotal, \
             total_tax            = EXCLUDED.total_tax, \
             shipping_total       = EXCLUDED.shipping_total, \
             discount_total       = EXCLUDED.discount_total, \
             customer_id          = EXCLUDED.customer_id, \
             billing              = EXCLUDED.billing, \
             shipping             = EXCLUDED.shipping, \
             payment_method       = EXCLUDED.payment_method, \
             payment_method_title = EXCLUDED.payment_method_title, \
             transaction_id       = EXCLUDED.transaction_id, \
             attribution          = EXCLUDED.attribution, \
             source_created_at    = EXCLUDED.source_created_at, \
             source_modified_at   = EXCLUDED.source_modified_at, \
             paid_at              = EXCLUDED.paid_at, \
             completed_at         = EXCLUDED.completed_at, \
             updated_at           = NOW() \
         RETURNING (xmax = 0) AS was_inserted",
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(&order.currency)
    .bind(order.total)
    .bind(order.subtotal)
    .bind(order.total_tax)
    .bind(order.shipping_total)
    .bind(order.discount_total)
    .bind(order.customer_id)
    .bind(Json(&order.billing))
    .bind(Json(&order.shipping))
    .bind(&order.payment_method)
    .bind(&order.payment_method_title)
    .bind(&order.transaction_id)
    .bind(Json(&order.attribution))
    .bind(order.created_at)
    .bind(order.modified_at)
    .bind(order.paid_at)
    .bind(order.completed_at)
    .fetch_one(&mut **tx)
    .await
}

async fn insert_item(
    tx: &mut Transaction<'_, Postgres>,
    order_id: i64,
    item: &CanonicalOrderItem,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_items \
             (order_id, source_item_id, name, product_id, variant_id, quantity, unit_price, \
              line_subtotal, line_total, line_tax, unit_cost) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                 COALESCE($11, \
                     (SELECT COALESCE(cost_override, cost) FROM products WHERE id = $5), \
                     (SELECT COALESCE(cost_override, cost) FROM products WHERE id = $4)))",
    )
    .bind(order_id)
    .bind(item.source_item_id)
    .bind(&item.name)
    .bind(item.product_id)
    .bind(item.variant_id)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.line_subtotal)
    .bind(item.line_total)
    .bind(item.line_tax)
    .bind(item.unit_cost)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_coupon(
    tx: &mut Transaction<'_, Postgres>,
    order_id: i64,
    coupon: &CanonicalCoupon,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_coupons (order_id, code, discount, discount_type) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(&coupon.code)
    .bind(coupon.discount)
    .bind(&coupon.discount_type)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

/// Fetches an order header by storefront id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &PgPool, id: i64) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(
        "SELECT id, status, currency, total, subtotal, total_tax, shipping_total, \
                discount_total, customer_id, billing, shipping, payment_method, \
                payment_method_title, transaction_id, attribution, source_created_at, \
                source_modified_at, paid_at, completed_at, created_at, updated_at \
         FROM orders \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists the items of an order in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_items(
    pool: &PgPool,
    order_id: i64,
) -> Result<Vec<OrderItemRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, source_item_id, name, product_id, variant_id, quantity, \
                unit_price, line_subtotal, line_total, line_tax, unit_cost \
         FROM order_items \
         WHERE order_id = $1 \
         ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists the coupons of an order in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_coupons(
    pool: &PgPool,
    order_id: i64,
) -> Result<Vec<OrderCouponRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderCouponRow>(
        "SELECT id, order_id, code, discount, discount_type \
         FROM order_coupons \
         WHERE order_id = $1 \
         ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
