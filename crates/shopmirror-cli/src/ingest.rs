//! Offline ingestion: load a batch envelope from disk, or replay an audit
//! log, through the same coordinator the sync endpoints use.
//!
//! Replayed batches are not re-audited.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use shopmirror_ingest::{
    process_batch, read_audit_log, AuditSink, BatchEnvelope, BatchOptions, BatchSummary,
    NoopAuditLog, SyncKind,
};

/// Parsed contents of an ingest file.
#[derive(Debug)]
pub(crate) enum IngestSource {
    /// A single envelope JSON document.
    Envelope(BatchEnvelope),
    /// Every batch of an audit log, in write order.
    Replay(Vec<BatchEnvelope>),
}

impl IngestSource {
    fn batches(&self) -> Vec<&BatchEnvelope> {
        match self {
            Self::Envelope(envelope) => vec![envelope],
            Self::Replay(envelopes) => envelopes.iter().collect(),
        }
    }
}

/// Picks the batch kind: the `--kind` flag, else the body's `sync_type`.
pub(crate) fn resolve_kind(explicit: Option<&str>, body: &Value) -> anyhow::Result<SyncKind> {
    let declared = body.get("sync_type").and_then(Value::as_str);
    match (explicit, declared) {
        (Some(kind), _) | (None, Some(kind)) => Ok(kind.parse()?),
        (None, None) => {
            anyhow::bail!("batch kind unknown; pass --kind or set sync_type in the file")
        }
    }
}

/// Reads `path` as an audit log when it ends in `.jsonl`, otherwise as one
/// envelope document. Audit entries whose kind differs from `kind` are
/// skipped with a warning.
pub(crate) fn read_source(path: &Path, kind: Option<&str>) -> anyhow::Result<IngestSource> {
    let is_audit_log = path.extension().is_some_and(|ext| ext == "jsonl");

    if is_audit_log {
        let wanted = kind.map(str::parse::<SyncKind>).transpose()?;
        let mut envelopes = Vec::new();
        for (index, entry) in read_audit_log(path)?.into_iter().enumerate() {
            if wanted.is_some_and(|w| w != entry.kind) {
                tracing::warn!(index, kind = %entry.kind, "skipping audit entry of another kind");
                continue;
            }
            envelopes.push(BatchEnvelope::parse(entry.kind, entry.payload)?);
        }
        return Ok(IngestSource::Replay(envelopes));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let body: Value = serde_json::from_str(&text)?;
    let kind = resolve_kind(kind, &body)?;
    Ok(IngestSource::Envelope(BatchEnvelope::parse(kind, body)?))
}

/// Validates the file and prints what would be ingested.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any batch is malformed.
pub(crate) fn run_ingest_dry_run(path: &Path, kind: Option<&str>) -> anyhow::Result<()> {
    let source = read_source(path, kind)?;
    for envelope in source.batches() {
        println!(
            "dry-run: would ingest {} {} records",
            envelope.records().len(),
            envelope.kind
        );
    }
    Ok(())
}

/// Ingests every batch in the file and prints one summary line per batch.
///
/// Per-record failures are printed, not propagated.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any batch is malformed;
/// nothing is written in that case.
pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &shopmirror_core::AppConfig,
    path: &Path,
    kind: Option<&str>,
) -> anyhow::Result<()> {
    let source = read_source(path, kind)?;
    let options = BatchOptions::from_app_config(config);
    let audit: Arc<dyn AuditSink> = Arc::new(NoopAuditLog);

    let mut total = BatchSummary::default();
    for envelope in source.batches() {
        let summary = process_batch(pool, envelope, Arc::clone(&audit), options).await;
        println!(
            "{}: received {}, inserted {}, updated {}, items {}, failed {}",
            envelope.kind,
            summary.received,
            summary.inserted,
            summary.updated,
            summary.items_inserted,
            summary.errors.len()
        );
        for error in &summary.errors {
            let id = error.id.map_or_else(|| "?".to_owned(), |id| id.to_string());
            eprintln!("  record {} (id {id}): {}", error.index, error.error);
        }

        total.received += summary.received;
        total.inserted += summary.inserted;
        total.updated += summary.updated;
        total.items_inserted += summary.items_inserted;
        total.errors.extend(summary.errors);
    }

    if let IngestSource::Replay(batches) = &source {
        println!(
            "replayed {} batches: received {}, inserted {}, updated {}, failed {}",
            batches.len(),
            total.received,
            total.inserted,
            total.updated,
            total.errors.len()
        );
    }

    Ok(())
}
