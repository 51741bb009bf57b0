//! End-to-end batch tests against a fresh, fully-migrated database per test.

use std::io;
use std::sync::Arc;

use chrono_tz::Europe::Paris;
use serde_json::{json, Value};
use shopmirror_ingest::{
    process_batch, read_audit_log, AuditSink, BatchEnvelope, BatchOptions, FileAuditLog,
    NoopAuditLog, SyncKind,
};

fn noop() -> Arc<dyn AuditSink> {
    Arc::new(NoopAuditLog)
}

/// Sink whose disk is always full.
struct BrokenAuditLog;

impl AuditSink for BrokenAuditLog {
    fn append(&self, _kind: SyncKind, _payload: &Value) -> io::Result<()> {
        Err(io::Error::other("no space left on device"))
    }
}

fn options() -> BatchOptions {
    BatchOptions {
        concurrency: 4,
        source_timezone: Paris,
    }
}

fn envelope(kind: SyncKind, records: Value) -> BatchEnvelope {
    BatchEnvelope::parse(kind, json!({ "data": records })).expect("valid envelope")
}

async fn count(pool: &sqlx::PgPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("count query failed ({sql}): {e}"))
}

fn customer(id: i64, email: &str) -> Value {
    json!({
        "user": {"id": id, "user_email": email, "user_registered": "2024-02-01 08:00:00"},
        "meta": {"billing_country": "FR", "_order_count": "1"}
    })
}

fn order(id: i64, status: &str, totals: &[&str]) -> Value {
    let items: Vec<Value> = totals
        .iter()
        .enumerate()
        .map(|(n, total)| {
            json!({
                "item": {"order_item_id": n + 1, "order_item_name": format!("Line {n}"),
                         "order_item_type": "line_item"},
                "meta": {"_product_id": 10 + n, "_qty": "1", "_line_total": total}
            })
        })
        .collect();
    json!({
        "post": {"id": id, "post_status": status, "post_date": "2024-05-10 14:00:00"},
        "meta": {"_order_total": "0", "_billing_country": "FR"},
        "items": items
    })
}

#[sqlx::test(migrations = "../../migrations")]
async fn customer_resync_reports_updates_not_inserts(pool: sqlx::PgPool) {
    let batch = envelope(
        SyncKind::Customers,
        json!([customer(1, "a@example.com"), customer(2, "b@example.com")]),
    );

    let first = process_batch(&pool, &batch, noop(), options()).await;
    assert_eq!((first.inserted, first.updated), (2, 0));
    assert!(first.errors.is_empty());

    let second = process_batch(&pool, &batch, noop(), options()).await;
    assert_eq!((second.inserted, second.updated), (0, 2));
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM customers").await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_records_are_reported_in_input_order(pool: sqlx::PgPool) {
    let batch = envelope(
        SyncKind::Customers,
        json!([
            customer(1, "a@example.com"),
            {"meta": {"first_name": "no user"}},
            customer(3, "c@example.com"),
            {"user": {"user_login": "no id"}},
        ]),
    );

    let summary = process_batch(&pool, &batch, noop(), options()).await;

    assert_eq!(summary.received, 4);
    assert_eq!(summary.inserted, 2);
    let failed: Vec<usize> = summary.errors.iter().map(|e| e.index).collect();
    assert_eq!(failed, vec![1, 3]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn standalone_variation_before_parent_in_same_batch(pool: sqlx::PgPool) {
    let batch = envelope(
        SyncKind::Products,
        json!([
            {"product_type": "variation", "post": {"id": 101, "post_parent": 100}},
            {"product_type": "variable", "post": {"id": 100, "post_title": "Tee"}},
        ]),
    );

    let summary = process_batch(&pool, &batch, noop(), options()).await;

    assert!(summary.errors.is_empty(), "errors: {:?}", summary.errors);
    assert_eq!(summary.inserted, 2);
    let family = shopmirror_db::resolve_family(&pool, 101)
        .await
        .expect("resolve failed")
        .expect("family missing");
    assert_eq!(family.all_ids(), vec![100, 101]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_order_does_not_block_the_rest(pool: sqlx::PgPool) {
    let batch = envelope(
        SyncKind::Orders,
        json!([
            order(1, "wc-completed", &["10.00", "5.00"]),
            order(
                2,
                "wc-completed",
                &["1.00", "1.00", "100000000000.00", "1.00", "1.00"]
            ),
            order(3, "wc-mystery", &["1.00"]),
            order(4, "wc-processing", &["2.00"]),
        ]),
    );

    let summary = process_batch(&pool, &batch, noop(), options()).await;

    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.items_inserted, 3);
    let failed: Vec<(usize, Option<i64>)> =
        summary.errors.iter().map(|e| (e.index, e.id)).collect();
    assert_eq!(failed, vec![(1, Some(2)), (2, Some(3))]);

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM orders").await, 2);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM order_items WHERE order_id = 2").await,
        0
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn processed_batch_is_appended_to_audit_log(pool: sqlx::PgPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let audit = Arc::new(FileAuditLog::new(dir.path()).expect("audit dir"));
    let batch = envelope(SyncKind::Customers, json!([customer(1, "a@example.com")]));

    process_batch(
        &pool,
        &batch,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
        options(),
    )
    .await;

    let entries = read_audit_log(&audit.path_for(SyncKind::Customers)).expect("read audit");
    assert_eq!(entries.len(), 1);
    assert_eq!(&entries[0].payload, batch.body());
}

#[sqlx::test(migrations = "../../migrations")]
async fn audit_failure_does_not_fail_the_batch(pool: sqlx::PgPool) {
    let audit: Arc<dyn AuditSink> = Arc::new(BrokenAuditLog);
    let batch = envelope(
        SyncKind::Customers,
        json!([customer(1, "a@example.com"), customer(2, "b@example.com")]),
    );

    let first = process_batch(&pool, &batch, Arc::clone(&audit), options()).await;
    assert_eq!((first.inserted, first.updated), (2, 0));
    assert!(first.errors.is_empty());

    let second = process_batch(&pool, &batch, audit, options()).await;
    assert_eq!((second.inserted, second.updated), (0, 2));
    assert!(second.errors.is_empty());

    assert_eq!(count(&pool, "SELECT COUNT(*) FROM customers").await, 2);
}
