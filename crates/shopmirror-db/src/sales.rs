//! Read queries feeding the analytics layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopmirror_core::{BundleComponent, BundleInfo, DateRange, OrderStatus, SaleLine};
use sqlx::{types::Json, PgPool};

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct SaleLineRow {
    order_id: i64,
    status: String,
    ordered_at: DateTime<Utc>,
    customer_id: Option<i64>,
    billing_country: Option<String>,
    billing_city: Option<String>,
    product_id: i64,
    variant_id: Option<i64>,
    quantity: i32,
    line_total: Decimal,
    unit_cost: Option<Decimal>,
}

impl SaleLineRow {
    fn into_sale_line(self) -> Option<SaleLine> {
        let status = match self.status.parse::<OrderStatus>() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    order_id = self.order_id,
                    error = %e,
                    "skipping order with unreadable status"
                );
                return None;
            }
        };
        Some(SaleLine {
            order_id: self.order_id,
            status,
            ordered_at: self.ordered_at,
            customer_id: self.customer_id,
            billing_country: self.billing_country,
            billing_city: self.billing_city,
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity: self.quantity,
            line_total: self.line_total,
            unit_cost: self.unit_cost,
        })
    }
}

/// Loads every line of the completed orders that contain at least one item
/// whose product id or variant id is in `product_ids`.
///
/// Sibling lines are included so that bundle detection and co-purchase
/// breakdowns can see the whole order. Orders are placed in `range` by their
/// storefront creation instant, falling back to the mirror's insert time.
/// Returns an empty vector for an empty id list.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_sale_lines(
    pool: &PgPool,
    product_ids: &[i64],
    range: DateRange,
) -> Result<Vec<SaleLine>, DbError> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, SaleLineRow>(
        "SELECT o.id AS order_id, \
                o.status, \
                COALESCE(o.source_created_at, o.created_at) AS ordered_at, \
                o.customer_id, \
                NULLIF(o.billing ->> 'country', '') AS billing_country, \
                NULLIF(o.billing ->> 'city', '') AS billing_city, \
                i.product_id, \
                i.variant_id, \
                i.quantity, \
                i.line_total, \
                i.unit_cost \
         FROM orders o \
         JOIN order_items i ON i.order_id = o.id \
         WHERE o.status = 'completed' \
           AND ($2::timestamptz IS NULL OR COALESCE(o.source_created_at, o.created_at) >= $2) \
           AND ($3::timestamptz IS NULL OR COALESCE(o.source_created_at, o.created_at) <= $3) \
           AND EXISTS ( \
               SELECT 1 FROM order_items m \
               WHERE m.order_id = o.id \
                 AND (m.product_id = ANY($1) OR m.variant_id = ANY($1)) \
           ) \
         ORDER BY o.id, i.id",
    )
    .bind(product_ids)
    .bind(range.from)
    .bind(range.to)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(SaleLineRow::into_sale_line)
        .collect())
}

/// Sale lines for `product_ids` together with the compositions of every
/// bundle sold in the same orders; the input to every analytics query.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn load_sales_with_bundles(
    pool: &PgPool,
    product_ids: &[i64],
    range: DateRange,
) -> Result<(Vec<SaleLine>, BundleInfo), DbError> {
    let lines = load_sale_lines(pool, product_ids, range).await?;

    let mut sold: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
    sold.sort_unstable();
    sold.dedup();
    let bundles = load_bundle_info(pool, &sold).await?;

    Ok((lines, bundles))
}

/// Loads the compositions of the bundle products among `product_ids`.
///
/// Non-bundles, unknown ids, and bundles without a stored composition are
/// simply absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_bundle_info(pool: &PgPool, product_ids: &[i64]) -> Result<BundleInfo, DbError> {
    if product_ids.is_empty() {
        return Ok(BundleInfo::default());
    }

    let rows: Vec<(i64, Json<Vec<BundleComponent>>)> = sqlx::query_as(
        "SELECT id, components \
         FROM products \
         WHERE kind = 'bundle' \
           AND components IS NOT NULL \
           AND jsonb_typeof(components) = 'array' \
           AND id = ANY($1)",
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await?;

    Ok(BundleInfo::new(rows.into_iter().map(|(id, Json(components))| {
        (id, components.into_iter().map(|c| c.component_id).collect())
    })))
}
