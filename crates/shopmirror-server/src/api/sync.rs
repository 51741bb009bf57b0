//! `POST /api/v1/sync/{kind}`: batch ingestion from the storefront.
//!
//! Responses always carry `success`. A processed batch is a 200 even when
//! some records failed; those are listed in `errors`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;
use shopmirror_ingest::{
    process_batch, BatchEnvelope, BatchOptions, BatchSummary, IngestError, RecordError, SyncKind,
};

use crate::middleware::RequestId;

use super::{ApiError, AppState, ErrorBody, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct SyncData {
    kind: SyncKind,
    received: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncResponse {
    success: bool,
    data: SyncData,
    inserted: u64,
    updated: u64,
    items_inserted: u64,
    errors: Vec<RecordError>,
    meta: ResponseMeta,
}

impl SyncResponse {
    fn new(kind: SyncKind, summary: BatchSummary, request_id: String) -> Self {
        Self {
            success: true,
            data: SyncData {
                kind,
                received: summary.received,
            },
            inserted: summary.inserted,
            updated: summary.updated,
            items_inserted: summary.items_inserted,
            errors: summary.errors,
            meta: ResponseMeta::new(request_id),
        }
    }
}

/// An [`ApiError`] rendered with `success: false`.
#[derive(Debug)]
pub(super) struct SyncRejection(ApiError);

#[derive(Serialize)]
struct SyncRejectionBody<'a> {
    success: bool,
    error: &'a ErrorBody,
    meta: &'a ResponseMeta,
}

impl IntoResponse for SyncRejection {
    fn into_response(self) -> Response {
        let body = SyncRejectionBody {
            success: false,
            error: &self.0.error,
            meta: &self.0.meta,
        };
        (self.0.status(), Json(body)).into_response()
    }
}

impl SyncRejection {
    fn new(request_id: &str, code: &str, message: impl Into<String>) -> Self {
        Self(ApiError::new(request_id, code, message))
    }
}

pub(super) async fn sync_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<Json<SyncResponse>, SyncRejection> {
    let rid = &req_id.0;

    let kind: SyncKind = kind
        .parse()
        .map_err(|e: IngestError| SyncRejection::new(rid, "not_found", e.to_string()))?;

    let body: Value = serde_json::from_slice(&body).map_err(|e| {
        SyncRejection::new(rid, "bad_request", format!("request body is not valid JSON: {e}"))
    })?;

    let envelope = BatchEnvelope::parse(kind, body).map_err(|e| {
        tracing::warn!(kind = %kind, error = %e, "rejected malformed sync batch");
        SyncRejection::new(rid, "bad_request", e.to_string())
    })?;

    let summary = process_batch(
        &state.pool,
        &envelope,
        Arc::clone(&state.audit),
        BatchOptions::from_app_config(&state.config),
    )
    .await;

    Ok(Json(SyncResponse::new(kind, summary, req_id.0)))
}
