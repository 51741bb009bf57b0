use super::*;

use serde_json::json;
use shopmirror_ingest::{AuditSink, FileAuditLog, SyncKind};

use crate::ingest::{read_source, resolve_kind, IngestSource};
use crate::stats::fmt_decimal;

#[test]
fn parses_db_ping_command() {
    let cli =
        Cli::try_parse_from(["shopmirror-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["shopmirror-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["shopmirror-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_ingest_with_kind_and_dry_run() {
    let cli = Cli::try_parse_from([
        "shopmirror-cli",
        "ingest",
        "--kind",
        "orders",
        "--dry-run",
        "batch.json",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Ingest {
            kind,
            file,
            dry_run,
        }) => {
            assert_eq!(kind.as_deref(), Some("orders"));
            assert_eq!(file, PathBuf::from("batch.json"));
            assert!(dry_run);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn ingest_requires_a_file() {
    assert!(Cli::try_parse_from(["shopmirror-cli", "ingest", "--kind", "orders"]).is_err());
}

#[test]
fn parses_stats_summary_with_range() {
    let cli = Cli::try_parse_from([
        "shopmirror-cli",
        "stats",
        "summary",
        "--product",
        "100",
        "--include-variants",
        "--from",
        "2024-01-01T00:00:00Z",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Stats {
            command:
                StatsCommands::Summary {
                    product,
                    include_variants,
                    from,
                    to,
                },
        }) => {
            assert_eq!(product, 100);
            assert!(include_variants);
            assert_eq!(from.map(|f| f.to_rfc3339()).as_deref(), Some("2024-01-01T00:00:00+00:00"));
            assert!(to.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn stats_summary_rejects_bad_timestamp() {
    let result = Cli::try_parse_from([
        "shopmirror-cli",
        "stats",
        "summary",
        "--product",
        "1",
        "--from",
        "last tuesday",
    ]);
    assert!(result.is_err());
}

#[test]
fn parses_stats_family() {
    let cli = Cli::try_parse_from(["shopmirror-cli", "stats", "family", "--product", "7"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Stats {
            command: StatsCommands::Family { product: 7 }
        })
    ));
}

#[test]
fn kind_flag_wins_over_sync_type() {
    let body = json!({"data": [], "sync_type": "orders"});
    assert_eq!(resolve_kind(Some("products"), &body).unwrap(), SyncKind::Products);
    assert_eq!(resolve_kind(None, &body).unwrap(), SyncKind::Orders);
    assert!(resolve_kind(None, &json!({"data": []})).is_err());
    assert!(resolve_kind(Some("refunds"), &body).is_err());
}

#[test]
fn envelope_file_is_read_as_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.json");
    std::fs::write(&path, r#"{"batch": [{}, {}], "sync_type": "orders"}"#).unwrap();

    match read_source(&path, None).unwrap() {
        IngestSource::Envelope(envelope) => {
            assert_eq!(envelope.kind, SyncKind::Orders);
            assert_eq!(envelope.records().len(), 2);
        }
        other @ IngestSource::Replay(_) => panic!("expected envelope, got {other:?}"),
    }
}

#[test]
fn malformed_envelope_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"records": []}"#).unwrap();
    assert!(read_source(&path, Some("orders")).is_err());
}

#[test]
fn audit_log_is_replayed_in_order_filtered_by_kind() {
    let dir = tempfile::tempdir().unwrap();
    let log = FileAuditLog::new(dir.path()).unwrap();
    log.append(SyncKind::Orders, &json!({"data": [{}]})).unwrap();
    log.append(SyncKind::Orders, &json!({"data": [{}, {}, {}]})).unwrap();
    let path = log.path_for(SyncKind::Orders);

    match read_source(&path, None).unwrap() {
        IngestSource::Replay(batches) => {
            let sizes: Vec<usize> = batches.iter().map(|b| b.records().len()).collect();
            assert_eq!(sizes, vec![1, 3]);
        }
        other @ IngestSource::Envelope(_) => panic!("expected replay, got {other:?}"),
    }

    match read_source(&path, Some("customers")).unwrap() {
        IngestSource::Replay(batches) => assert!(batches.is_empty()),
        other @ IngestSource::Envelope(_) => panic!("expected replay, got {other:?}"),
    }
}

#[test]
fn fmt_decimal_trims_scale_and_marks_missing() {
    assert_eq!(fmt_decimal(Some("4.0000".parse().unwrap())), "4");
    assert_eq!(fmt_decimal(Some("2.5000".parse().unwrap())), "2.5");
    assert_eq!(fmt_decimal(None), "\u{2014}");
}
