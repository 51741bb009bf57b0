//! Database operations for the `customers` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shopmirror_core::CanonicalCustomer;
use sqlx::{types::Json, PgPool};

use crate::{DbError, UpsertOutcome};

/// A row from the `customers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub email: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    pub billing: serde_json::Value,
    pub shipping: serde_json::Value,
    pub attribution: serde_json::Value,
    pub order_count: Option<i32>,
    pub total_spent: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts a customer keyed on its storefront id.
///
/// Every synced column is overwritten on conflict; `created_at` keeps the
/// time the row was first mirrored.
///
/// # Errors
///
/// Returns [`DbError::ConflictWrite`] if the statement fails.
pub async fn upsert_customer(
    pool: &PgPool,
    customer: &CanonicalCustomer,
) -> Result<UpsertOutcome, DbError> {
    let (id, was_inserted): (i64, bool) = sqlx::query_as(
        "INSERT INTO customers \
             (id, email, username, display_name, first_name, last_name, role, \
              registered_at, billing, shipping, attribution, order_count, total_spent) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (id) DO UPDATE SET \
             email         = EXCLUDED.email, \
             username      = EXCLUDED.username, \
             display_name  = EXCLUDED.display_name, \
             first_name    = EXCLUDED.first_name, \
             last_name     = EXCLUDED.last_name, \
             role          = EXCLUDED.role, \
             registered_at = EXCLUDED.registered_at, \
             billing       = EXCLUDED.billing, \
             shipping      = EXCLUDED.shipping, \
             attribution   = EXCLUDED.attribution, \
             order_count   = EXCLUDED.order_count, \
             total_spent   = EXCLUDED.total_spent, \
             updated_at    = NOW() \
         RETURNING id, (xmax = 0) AS was_inserted",
    )
    .bind(customer.id)
    .bind(&customer.email)
    .bind(&customer.username)
    .bind(&customer.display_name)
    .bind(&customer.first_name)
    .bind(&customer.last_name)
    .bind(&customer.role)
    .bind(customer.registered_at)
    .bind(Json(&customer.billing))
    .bind(Json(&customer.shipping))
    .bind(Json(&customer.attribution))
    .bind(customer.order_count)
    .bind(customer.total_spent)
    .fetch_one(pool)
    .await
    .map_err(DbError::write("customer", customer.id))?;

    Ok(UpsertOutcome {
        id,
        was_inserted,
        children_written: 0,
    })
}

/// Fetches a customer by storefront id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_customer(pool: &PgPool, id: i64) -> Result<Option<CustomerRow>, DbError> {
    let row = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, email, username, display_name, first_name, last_name, role, \
                registered_at, billing, shipping, attribution, order_count, total_spent, \
                created_at, updated_at \
         FROM customers \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
