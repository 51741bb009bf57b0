//! Product sales statistics.
//!
//! Every handler resolves the product's family first (404 for unknown ids),
//! then scopes the query to the family's ids when `include_variants=true`
//! and to the product alone otherwise.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopmirror_analytics::{
    CoPurchase, CustomerSales, EvolutionPoint, EvolutionScope, GeoSales, Granularity, KpiSummary,
    RecencyStats, TimingBucket, VariantSales,
};
use shopmirror_core::{BundleInfo, DateRange, SaleLine};
use shopmirror_db::ProductFamily;

use crate::middleware::RequestId;

use super::products::resolve_family_or_404;
use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct StatsQuery {
    pub include_variants: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub granularity: Option<String>,
    pub variant_id: Option<i64>,
}

impl StatsQuery {
    fn range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }

    fn scope_ids(&self, product_id: i64, family: &ProductFamily) -> Vec<i64> {
        if self.include_variants.unwrap_or(false) {
            family.all_ids()
        } else {
            vec![product_id]
        }
    }
}

/// Stats payload tagged with the ids it was computed over.
#[derive(Debug, Serialize)]
pub(super) struct ScopedStats<T: Serialize> {
    product_id: i64,
    product_ids: Vec<i64>,
    stats: T,
}

#[derive(Debug, Serialize)]
pub(super) struct VariantStatsItem {
    title: String,
    sku: Option<String>,
    attributes: serde_json::Value,
    #[serde(flatten)]
    sales: VariantSales,
}

#[derive(Debug, Serialize)]
pub(super) struct GeographyStats {
    countries: Vec<GeoSales>,
    cities: Vec<GeoSales>,
}

#[derive(Debug, Serialize)]
pub(super) struct CustomerStats {
    recency: RecencyStats,
    top_customers: Vec<CustomerSales>,
}

#[derive(Debug, Serialize)]
pub(super) struct TimingStats {
    timezone: String,
    weekdays: Vec<TimingBucket>,
    hours: Vec<TimingBucket>,
}

#[derive(Debug, Serialize)]
pub(super) struct EvolutionStats {
    granularity: Granularity,
    points: Vec<EvolutionPoint>,
}

type StatsResult<T> = Result<Json<ApiResponse<ScopedStats<T>>>, ApiError>;

async fn load_sales(
    state: &AppState,
    ids: &[i64],
    range: DateRange,
    request_id: &str,
) -> Result<(Vec<SaleLine>, BundleInfo), ApiError> {
    shopmirror_db::load_sales_with_bundles(&state.pool, ids, range)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))
}

fn respond<T: Serialize>(
    request_id: String,
    product_id: i64,
    product_ids: Vec<i64>,
    stats: T,
) -> Json<ApiResponse<ScopedStats<T>>> {
    Json(ApiResponse {
        data: ScopedStats {
            product_id,
            product_ids,
            stats,
        },
        meta: ResponseMeta::new(request_id),
    })
}

/// GET /api/v1/products/{id}/stats/summary
pub(super) async fn summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> StatsResult<KpiSummary> {
    let family = resolve_family_or_404(&state, id, &req_id.0).await?;
    let ids = query.scope_ids(id, &family);
    let range = query.range();

    let (lines, bundles) = load_sales(&state, &ids, range, &req_id.0).await?;
    let kpis = shopmirror_analytics::aggregate(&lines, &bundles, &ids, range);

    Ok(respond(req_id.0, id, ids, kpis))
}

/// GET /api/v1/products/{id}/stats/variants
///
/// One row per variant of the family, including variants without sales.
pub(super) async fn variants(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> StatsResult<Vec<VariantStatsItem>> {
    let family = resolve_family_or_404(&state, id, &req_id.0).await?;
    let variant_ids = family.variant_ids();
    let range = query.range();

    let (lines, bundles) = load_sales(&state, &variant_ids, range, &req_id.0).await?;
    let rows = shopmirror_analytics::variant_breakdown(&lines, &bundles, &variant_ids, range);

    let data = family
        .variants
        .into_iter()
        .zip(rows)
        .map(|(variant, sales)| VariantStatsItem {
            title: variant.title,
            sku: variant.sku,
            attributes: variant.attributes,
            sales,
        })
        .collect();

    Ok(respond(req_id.0, id, variant_ids, data))
}

/// GET /api/v1/products/{id}/stats/evolution
pub(super) async fn evolution(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> StatsResult<EvolutionStats> {
    let rid = &req_id.0;

    let granularity: Granularity = query
        .granularity
        .as_deref()
        .unwrap_or("day")
        .parse()
        .map_err(|e: shopmirror_core::CoreError| {
            ApiError::new(rid, "validation_error", e.to_string())
        })?;

    let family = resolve_family_or_404(&state, id, rid).await?;

    let (scope, ids) = match query.variant_id {
        Some(variant_id) => {
            if !family.variant_ids().contains(&variant_id) {
                return Err(ApiError::new(
                    rid,
                    "validation_error",
                    format!("product {variant_id} is not a variant of product {id}"),
                ));
            }
            (EvolutionScope::Variant(variant_id), vec![variant_id])
        }
        None => {
            let ids = query.scope_ids(id, &family);
            let scope = if query.include_variants.unwrap_or(false) {
                EvolutionScope::Family(ids.clone())
            } else {
                EvolutionScope::Products(ids.clone())
            };
            (scope, ids)
        }
    };

    let range = query.range();
    let (lines, bundles) = load_sales(&state, &ids, range, rid).await?;
    let points = shopmirror_analytics::evolution(&lines, &bundles, &scope, granularity, range);

    Ok(respond(
        req_id.0,
        id,
        ids,
        EvolutionStats {
            granularity,
            points,
        },
    ))
}

/// GET /api/v1/products/{id}/stats/co-purchases
pub(super) async fn co_purchases(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> StatsResult<Vec<CoPurchase>> {
    let family = resolve_family_or_404(&state, id, &req_id.0).await?;
    let ids = query.scope_ids(id, &family);
    let range = query.range();

    let (lines, bundles) = load_sales(&state, &ids, range, &req_id.0).await?;
    let rows = shopmirror_analytics::co_purchases(
        &lines,
        &bundles,
        &ids,
        range,
        normalize_limit(query.limit),
    );

    Ok(respond(req_id.0, id, ids, rows))
}

/// GET /api/v1/products/{id}/stats/geography
pub(super) async fn geography(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> StatsResult<GeographyStats> {
    let family = resolve_family_or_404(&state, id, &req_id.0).await?;
    let ids = query.scope_ids(id, &family);
    let range = query.range();

    let (lines, bundles) = load_sales(&state, &ids, range, &req_id.0).await?;
    let stats = GeographyStats {
        countries: shopmirror_analytics::by_country(&lines, &bundles, &ids, range),
        cities: shopmirror_analytics::by_city(&lines, &bundles, &ids, range),
    };

    Ok(respond(req_id.0, id, ids, stats))
}

/// GET /api/v1/products/{id}/stats/customers
pub(super) async fn customers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> StatsResult<CustomerStats> {
    let family = resolve_family_or_404(&state, id, &req_id.0).await?;
    let ids = query.scope_ids(id, &family);
    let range = query.range();

    let (lines, bundles) = load_sales(&state, &ids, range, &req_id.0).await?;
    let stats = CustomerStats {
        recency: shopmirror_analytics::recency(&lines, &ids, range, Utc::now()),
        top_customers: shopmirror_analytics::by_customer(
            &lines,
            &bundles,
            &ids,
            range,
            normalize_limit(query.limit),
        ),
    };

    Ok(respond(req_id.0, id, ids, stats))
}

/// GET /api/v1/products/{id}/stats/timing
///
/// Weekday and hour buckets in the configured source timezone.
pub(super) async fn timing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> StatsResult<TimingStats> {
    let family = resolve_family_or_404(&state, id, &req_id.0).await?;
    let ids = query.scope_ids(id, &family);
    let range = query.range();
    let zone = state.config.source_timezone;

    let (lines, bundles) = load_sales(&state, &ids, range, &req_id.0).await?;
    let stats = TimingStats {
        timezone: zone.name().to_owned(),
        weekdays: shopmirror_analytics::by_weekday(&lines, &bundles, &ids, range, zone),
        hours: shopmirror_analytics::by_hour(&lines, &bundles, &ids, range, zone),
    };

    Ok(respond(req_id.0, id, ids, stats))
}
