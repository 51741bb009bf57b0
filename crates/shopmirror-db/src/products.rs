//! Database operations for the `products` table.
//!
//! Variations live in the same table as their parent, distinguished by
//! `kind = 'variant'` and a non-null `parent_id`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopmirror_core::{CanonicalProduct, ProductKind};
use sqlx::{types::Json, PgPool, Postgres, Transaction};

use crate::{DbError, UpsertOutcome};

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    /// One of `simple`, `variable_parent`, `variant`, `bundle`.
    pub kind: String,
    pub parent_id: Option<i64>,
    pub title: String,
    pub slug: Option<String>,
    pub status: String,
    pub sku: Option<String>,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub cost_override: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub stock_status: String,
    pub attributes: serde_json::Value,
    pub components: Option<serde_json::Value>,
    pub image_url: Option<String>,
    pub source_created_at: Option<DateTime<Utc>>,
    pub source_modified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// Parsed `kind`; `None` only if the row predates the CHECK constraint.
    #[must_use]
    pub fn product_kind(&self) -> Option<ProductKind> {
        self.kind.parse().ok()
    }

    /// The cost analytics should use: the manual override when set, else the
    /// synced cost.
    #[must_use]
    pub fn effective_cost(&self) -> Option<Decimal> {
        self.cost_override.or(self.cost)
    }
}

pub(crate) const PRODUCT_COLUMNS: &str = "id, kind, parent_id, title, slug, status, sku, \
     regular_price, sale_price, price, cost, cost_override, stock_quantity, stock_status, \
     attributes, components, image_url, source_created_at, source_modified_at, \
     created_at, updated_at";

/// Upserts a product and any variations delivered nested inside it.
///
/// The parent and all nested variations are written in one transaction: if
/// any of them fails, none is kept. `cost_override` is never touched.
///
/// # Errors
///
/// Returns [`DbError::ConflictWrite`] naming the product or variation whose
/// write failed.
pub async fn upsert_product(
    pool: &PgPool,
    product: &CanonicalProduct,
) -> Result<UpsertOutcome, DbError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(DbError::write("product", product.id))?;

    let was_inserted = upsert_product_row(&mut tx, product).await?;

    let mut children_written = 0u64;
    for variation in &product.variations {
        upsert_product_row(&mut tx, variation).await?;
        children_written += 1;
    }

    tx.commit()
        .await
        .map_err(DbError::write("product", product.id))?;

    Ok(UpsertOutcome {
        id: product.id,
        was_inserted,
        children_written,
    })
}

async fn upsert_product_row(
    tx: &mut Transaction<'_, Postgres>,
    product: &CanonicalProduct,
) -> Result<bool, DbError> {
    let components = product.components.as_ref().map(Json);

    let was_inserted: bool = sqlx::query_scalar(
        "INSERT INTO products \
             (id, kind, parent_id, title, slug, status, sku, regular_price, sale_price, \
              price, cost, stock_quantity, stock_status, attributes, components, image_url, \
              source_created_at, source_modified_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 $17, $18) \
         ON CONFLICT (id) DO UPDATE SET \
             kind               = EXCLUDED.kind, \
             parent_id          = EXCLUDED.parent_id, \
             title              = EXCLUDED.title, \
             slug               = EXCLUDED.slug, \
             status             = EXCLUDED.status, \
             sku                = EXCLUDED.sku, \
             regular_price      = EXCLUDED.regular_price, \
             sale_price         = EXCLUDED.sale_price, \
             price              = EXCLUDED.price, \
             cost               = EXCLUDED.cost, \
             stock_quantity     = EXCLUDED.stock_quantity, \
             stock_status       = EXCLUDED.stock_status, \
             attributes         = EXCLUDED.attributes, \
             components         = EXCLUDED.components, \
             image_url          = EXCLUDED.image_url, \
             source_created_at  = EXCLUDED.source_created_at, \
             source_modified_at = EXCLUDED.source_modified_at, \
             updated_at         = NOW() \
         RETURNING (xmax = 0) AS was_inserted",
    )
    .bind(product.id)
    .bind(product.kind.as_str())
    .bind(product.parent_id)
    .bind(&product.title)
    .bind(&product.slug)
    .bind(&product.status)
    .bind(&product.sku)
    .bind(product.regular_price)
    .bind(product.sale_price)
    .bind(product.price)
    .bind(product.cost)
    .bind(product.stock_quantity)
    .bind(&product.stock_status)
    .bind(Json(&product.attributes))
    .bind(components)
    .bind(&product.image_url)
    .bind(product.created_at)
    .bind(product.modified_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(DbError::write("product", product.id))?;

    Ok(was_inserted)
}

/// Fetches a product (of any kind) by storefront id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Sets or clears (`None`) the manual cost override of a product.
///
/// Returns `false` when no product has that id. Only order items written
/// after this call snapshot the new cost.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_cost_override(
    pool: &PgPool,
    id: i64,
    cost_override: Option<Decimal>,
) -> Result<bool, DbError> {
    let rows_affected = sqlx::query(
        "UPDATE products SET cost_override = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(cost_override)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}
