//! Storefront sync ingestion: raw payload types, canonicalization, and the
//! batch coordinator that writes canonical records through `shopmirror-db`.

pub mod audit;
pub mod batch;
pub mod bundle;
pub mod envelope;
pub mod error;
pub mod normalize;
pub mod parse_helpers;
pub mod types;

pub use audit::{read_audit_log, AuditEntry, AuditSink, FileAuditLog, NoopAuditLog};
pub use batch::{process_batch, BatchOptions, BatchSummary, RecordError};
pub use bundle::decode_components;
pub use envelope::{BatchEnvelope, SyncKind};
pub use error::IngestError;
pub use normalize::{transform_customer, transform_order, transform_product};
pub use types::{RawCustomer, RawOrder, RawProduct};
