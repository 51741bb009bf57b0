//! Resolution of a product to its family: the parent plus all variants.

use sqlx::PgPool;

use crate::products::{ProductRow, PRODUCT_COLUMNS};
use crate::DbError;

/// A parent product with its variants. For a simple product or bundle the
/// product is its own parent and `variants` is empty.
#[derive(Debug, Clone)]
pub struct ProductFamily {
    pub parent: ProductRow,
    /// Ordered by id ascending.
    pub variants: Vec<ProductRow>,
}

impl ProductFamily {
    /// Parent id followed by every variant id.
    #[must_use]
    pub fn all_ids(&self) -> Vec<i64> {
        std::iter::once(self.parent.id)
            .chain(self.variants.iter().map(|v| v.id))
            .collect()
    }

    #[must_use]
    pub fn variant_ids(&self) -> Vec<i64> {
        self.variants.iter().map(|v| v.id).collect()
    }

    /// `[parent] ++ variants`.
    #[must_use]
    pub fn all(&self) -> Vec<&ProductRow> {
        std::iter::once(&self.parent)
            .chain(self.variants.iter())
            .collect()
    }
}

/// Resolves `product_id` to its family.
///
/// A variant resolves through its `parent_id`; any other product is its own
/// parent. Starting from a parent or from any of its variants yields the
/// same family. Returns `Ok(None)` when the id is unknown.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn resolve_family(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<ProductFamily>, DbError> {
    let Some(start) = crate::products::get_product(pool, product_id).await? else {
        return Ok(None);
    };

    let parent = match start.parent_id {
        Some(parent_id) if parent_id != start.id => {
            match crate::products::get_product(pool, parent_id).await? {
                Some(parent) => parent,
                None => {
                    tracing::warn!(
                        product_id,
                        parent_id,
                        "variant parent missing; treating variant as its own family"
                    );
                    start
                }
            }
        }
        _ => start,
    };

    let variants = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE parent_id = $1 ORDER BY id ASC"
    ))
    .bind(parent.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(ProductFamily { parent, variants }))
}
