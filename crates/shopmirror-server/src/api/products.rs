use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopmirror_db::{ProductFamily, ProductRow};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    kind: String,
    parent_id: Option<i64>,
    title: String,
    sku: Option<String>,
    status: String,
    price: Option<Decimal>,
    regular_price: Option<Decimal>,
    sale_price: Option<Decimal>,
    cost: Option<Decimal>,
    cost_override: Option<Decimal>,
    effective_cost: Option<Decimal>,
    stock_quantity: Option<i32>,
    stock_status: String,
    attributes: serde_json::Value,
    image_url: Option<String>,
}

impl From<ProductRow> for ProductItem {
    fn from(row: ProductRow) -> Self {
        Self {
            effective_cost: row.effective_cost(),
            id: row.id,
            kind: row.kind,
            parent_id: row.parent_id,
            title: row.title,
            sku: row.sku,
            status: row.status,
            price: row.price,
            regular_price: row.regular_price,
            sale_price: row.sale_price,
            cost: row.cost,
            cost_override: row.cost_override,
            stock_quantity: row.stock_quantity,
            stock_status: row.stock_status,
            attributes: row.attributes,
            image_url: row.image_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct FamilyItem {
    parent: ProductItem,
    variants: Vec<ProductItem>,
    /// Parent id followed by variant ids.
    all_ids: Vec<i64>,
}

impl From<ProductFamily> for FamilyItem {
    fn from(family: ProductFamily) -> Self {
        let all_ids = family.all_ids();
        Self {
            parent: family.parent.into(),
            variants: family.variants.into_iter().map(Into::into).collect(),
            all_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CostOverrideRequest {
    /// `null` clears the override.
    pub cost: Option<Decimal>,
}

/// Resolves `id` to its family, returning 404 if the product is unknown.
pub(super) async fn resolve_family_or_404(
    state: &AppState,
    id: i64,
    request_id: &str,
) -> Result<ProductFamily, ApiError> {
    shopmirror_db::resolve_family(&state.pool, id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", format!("product {id} not found")))
}

/// GET /api/v1/products/{id}/family
pub(super) async fn get_family(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FamilyItem>>, ApiError> {
    let family = resolve_family_or_404(&state, id, &req_id.0).await?;

    Ok(Json(ApiResponse {
        data: family.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// PUT /api/v1/products/{id}/cost-override
pub(super) async fn put_cost_override(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<CostOverrideRequest>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;

    if body.cost.is_some_and(|c| c.is_sign_negative()) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "cost must not be negative",
        ));
    }

    let updated = shopmirror_db::set_cost_override(&state.pool, id, body.cost)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !updated {
        return Err(ApiError::new(rid, "not_found", format!("product {id} not found")));
    }
    tracing::info!(product_id = id, cost = ?body.cost, "cost override updated");

    let row = shopmirror_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("product {id} not found")))?;

    Ok(Json(ApiResponse {
        data: row.into(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
