//! Batch coordinator: canonicalize, write, and summarize one sync batch.
//!
//! Records are independent. A record that fails validation or its write is
//! reported in [`BatchSummary::errors`] and the rest of the batch carries
//! on; nothing is retried.

use std::sync::Arc;

use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use shopmirror_core::{CanonicalProduct, ProductKind};
use sqlx::PgPool;

use crate::audit::AuditSink;
use crate::envelope::{BatchEnvelope, SyncKind};
use crate::error::IngestError;
use crate::normalize::{transform_customer, transform_order, transform_product};
use crate::parse_helpers::i64_from_value;

/// Knobs for [`process_batch`].
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Upper bound on concurrent customer/product upserts. Orders are always
    /// written one at a time.
    pub concurrency: usize,
    pub source_timezone: Tz,
}

impl BatchOptions {
    #[must_use]
    pub fn from_app_config(config: &shopmirror_core::AppConfig) -> Self {
        Self {
            concurrency: config.sync_concurrency,
            source_timezone: config.source_timezone,
        }
    }
}

/// A record that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    /// Position of the record in the batch.
    pub index: usize,
    /// External id, when the record carried a readable one.
    pub id: Option<i64>,
    pub error: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub received: usize,
    pub inserted: u64,
    pub updated: u64,
    /// Order items written (orders only).
    pub items_inserted: u64,
    /// In input order.
    pub errors: Vec<RecordError>,
}

impl BatchSummary {
    fn record(&mut self, was_inserted: bool) {
        if was_inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }

    fn fail(&mut self, kind: SyncKind, index: usize, id: Option<i64>, error: &IngestError) {
        tracing::warn!(
            kind = %kind,
            index,
            id = ?id,
            error = %error,
            "sync record failed"
        );
        self.errors.push(RecordError {
            index,
            id,
            error: error.to_string(),
        });
    }
}

/// Processes every record of `envelope` and returns the summary.
///
/// After processing, the verbatim body is handed to `audit` on the blocking
/// pool; an audit failure is logged and does not affect the summary.
pub async fn process_batch(
    pool: &PgPool,
    envelope: &BatchEnvelope,
    audit: Arc<dyn AuditSink>,
    options: BatchOptions,
) -> BatchSummary {
    let kind = envelope.kind;
    let records = envelope.records();

    let mut summary = match kind {
        SyncKind::Customers => process_customers(pool, records, options).await,
        SyncKind::Products => process_products(pool, records, options).await,
        SyncKind::Orders => process_orders(pool, records, options).await,
    };
    summary.received = records.len();
    summary.errors.sort_by_key(|e| e.index);

    let payload = envelope.body().clone();
    match tokio::task::spawn_blocking(move || audit.append(kind, &payload)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(kind = %kind, error = %e, "failed to append batch to audit log");
        }
        Err(e) => tracing::warn!(kind = %kind, error = %e, "audit task did not complete"),
    }

    tracing::info!(
        kind = %kind,
        received = summary.received,
        inserted = summary.inserted,
        updated = summary.updated,
        items_inserted = summary.items_inserted,
        failed = summary.errors.len(),
        "sync batch processed"
    );

    summary
}

fn deserialize<T: serde::de::DeserializeOwned>(
    kind: SyncKind,
    index: usize,
    record: &Value,
) -> Result<T, IngestError> {
    <T as serde::Deserialize>::deserialize(record).map_err(|source| IngestError::Deserialize {
        context: format!("{} record {index}", kind.entity()),
        source,
    })
}

/// Best-effort external id for error reporting.
fn record_id(kind: SyncKind, record: &Value) -> Option<i64> {
    let pointers: &[&str] = match kind {
        SyncKind::Customers => &["/user/id", "/user/ID"],
        SyncKind::Products | SyncKind::Orders => &["/post/id", "/post/ID"],
    };
    pointers
        .iter()
        .find_map(|p| record.pointer(p))
        .and_then(i64_from_value)
}

async fn process_customers(
    pool: &PgPool,
    records: &[Value],
    options: BatchOptions,
) -> BatchSummary {
    let kind = SyncKind::Customers;

    let pending: Vec<_> = records
        .iter()
        .enumerate()
        .map(|(index, record)| customer_outcome(pool, index, record, options))
        .collect();
    let results: Vec<(usize, Result<bool, IngestError>)> = stream::iter(pending)
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    let mut summary = BatchSummary::default();
    for (index, outcome) in results {
        match outcome {
            Ok(was_inserted) => summary.record(was_inserted),
            Err(e) => summary.fail(kind, index, record_id(kind, &records[index]), &e),
        }
    }
    summary
}

async fn customer_outcome(
    pool: &PgPool,
    index: usize,
    record: &Value,
    options: BatchOptions,
) -> (usize, Result<bool, IngestError>) {
    let kind = SyncKind::Customers;
    let outcome = async {
        let raw = deserialize(kind, index, record)?;
        let customer = transform_customer(raw, options.source_timezone)?;
        let written = shopmirror_db::upsert_customer(pool, &customer).await?;
        Ok::<_, IngestError>(written.was_inserted)
    }
    .await;
    (index, outcome)
}

/// Products are written in two waves: everything that is not a standalone
/// variation first, then standalone variations, so a parent and its
/// variation in the same batch never race on the parent foreign key.
async fn process_products(pool: &PgPool, records: &[Value], options: BatchOptions) -> BatchSummary {
    let kind = SyncKind::Products;
    let mut summary = BatchSummary::default();

    let mut parents: Vec<(usize, CanonicalProduct)> = Vec::new();
    let mut variations: Vec<(usize, CanonicalProduct)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let canonical = deserialize(kind, index, record)
            .and_then(|raw| transform_product(raw, options.source_timezone));
        match canonical {
            Ok(product) if product.kind == ProductKind::Variant => {
                variations.push((index, product));
            }
            Ok(product) => parents.push((index, product)),
            Err(e) => summary.fail(kind, index, record_id(kind, record), &e),
        }
    }

    for wave in [parents, variations] {
        let results: Vec<(usize, i64, Result<bool, IngestError>)> = stream::iter(wave)
            .map(|(index, product)| async move {
                let outcome = shopmirror_db::upsert_product(pool, &product)
                    .await
                    .map(|written| written.was_inserted)
                    .map_err(IngestError::from);
                (index, product.id, outcome)
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        for (index, id, outcome) in results {
            match outcome {
                Ok(was_inserted) => summary.record(was_inserted),
                Err(e) => summary.fail(kind, index, Some(id), &e),
            }
        }
    }

    summary
}

async fn process_orders(pool: &PgPool, records: &[Value], options: BatchOptions) -> BatchSummary {
    let kind = SyncKind::Orders;
    let mut summary = BatchSummary::default();

    for (index, record) in records.iter().enumerate() {
        let outcome = async {
            let raw = deserialize(kind, index, record)?;
            let order = transform_order(raw, options.source_timezone)?;
            Ok::<_, IngestError>(shopmirror_db::upsert_order(pool, &order).await?)
        }
        .await;

        match outcome {
            Ok(written) => {
                summary.record(written.was_inserted);
                summary.items_inserted += written.items_inserted;
            }
            Err(e) => summary.fail(kind, index, record_id(kind, record), &e),
        }
    }

    summary
}
