//! Append-only log of every accepted batch.
//!
//! Each batch becomes one JSON line in `<dir>/<kind>.jsonl`:
//!
//! ```json
//! {"received_at":"...","kind":"orders","sha256":"...","payload":{...}}
//! ```
//!
//! The log is a replay source, not part of the write path: failures are
//! reported to the caller, who logs and moves on.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::envelope::SyncKind;

/// Destination for verbatim batch payloads.
pub trait AuditSink: Send + Sync {
    /// Appends one batch.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; callers treat it as non-fatal.
    fn append(&self, kind: SyncKind, payload: &Value) -> io::Result<()>;
}

/// One line of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub received_at: DateTime<Utc>,
    pub kind: SyncKind,
    /// Hex SHA-256 of the compact payload JSON.
    pub sha256: String,
    pub payload: Value,
}

impl AuditEntry {
    #[must_use]
    pub fn new(kind: SyncKind, payload: &Value) -> Self {
        Self {
            received_at: Utc::now(),
            kind,
            sha256: payload_digest(payload),
            payload: payload.clone(),
        }
    }
}

fn payload_digest(payload: &Value) -> String {
    let digest = Sha256::digest(payload.to_string().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Writes one `<kind>.jsonl` file per sync kind under a directory.
#[derive(Debug)]
pub struct FileAuditLog {
    dir: PathBuf,
    // Serializes appends so concurrent batches never interleave lines.
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    /// Creates the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn path_for(&self, kind: SyncKind) -> PathBuf {
        self.dir.join(format!("{}.jsonl", kind.as_str()))
    }
}

impl AuditSink for FileAuditLog {
    fn append(&self, kind: SyncKind, payload: &Value) -> io::Result<()> {
        let mut line = serde_json::to_string(&AuditEntry::new(kind, payload))?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| io::Error::other("audit log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(kind))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Sink used when auditing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditLog;

impl AuditSink for NoopAuditLog {
    fn append(&self, _kind: SyncKind, _payload: &Value) -> io::Result<()> {
        Ok(())
    }
}

/// Reads every entry of an audit file in write order. Blank lines are
/// skipped.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read or a line is not a
/// valid entry.
pub fn read_audit_log(path: &Path) -> io::Result<Vec<AuditEntry>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_one_line_per_batch_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path().join("audit")).unwrap();

        let first = json!({"data": [{"post": {"id": 1}}]});
        let second = json!({"batch": []});
        log.append(SyncKind::Orders, &first).unwrap();
        log.append(SyncKind::Orders, &second).unwrap();
        log.append(SyncKind::Customers, &json!({"data": []}))
            .unwrap();

        let orders = read_audit_log(&log.path_for(SyncKind::Orders)).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].payload, first);
        assert_eq!(orders[1].payload, second);
        assert_eq!(orders[0].kind, SyncKind::Orders);

        let customers = read_audit_log(&log.path_for(SyncKind::Customers)).unwrap();
        assert_eq!(customers.len(), 1);
    }

    #[test]
    fn digest_identifies_identical_payloads() {
        let payload = json!({"data": [1, 2, 3]});
        let a = AuditEntry::new(SyncKind::Products, &payload);
        let b = AuditEntry::new(SyncKind::Products, &payload);
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.sha256.len(), 64);
        assert_ne!(
            a.sha256,
            AuditEntry::new(SyncKind::Products, &json!({})).sha256
        );
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        assert!(FileAuditLog::new(blocker.join("nested")).is_err());
    }

    #[test]
    fn noop_sink_accepts_everything() {
        assert!(NoopAuditLog.append(SyncKind::Orders, &json!(null)).is_ok());
    }
}
