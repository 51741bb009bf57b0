//! Batch envelopes accepted by the sync endpoints.
//!
//! ```json
//! { "data": [ ...records ], "sync_type": "orders", "timestamp": "..." }
//! ```
//!
//! `batch` is accepted as a synonym for `data`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IngestError;

const RECORD_KEYS: &[&str] = &["data", "batch"];

/// Entity kind a batch carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Customers,
    Products,
    Orders,
}

impl SyncKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Orders => "orders",
        }
    }

    /// Singular name used in per-record errors and logs.
    #[must_use]
    pub fn entity(self) -> &'static str {
        match self {
            Self::Customers => "customer",
            Self::Products => "product",
            Self::Orders => "order",
        }
    }
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customers" | "customer" => Ok(Self::Customers),
            "products" | "product" => Ok(Self::Products),
            "orders" | "order" => Ok(Self::Orders),
            other => Err(IngestError::MalformedInput(format!(
                "unknown sync kind \"{other}\""
            ))),
        }
    }
}

/// A validated batch: the verbatim body plus the kind it was posted as.
#[derive(Debug, Clone)]
pub struct BatchEnvelope {
    pub kind: SyncKind,
    body: Value,
    records_key: &'static str,
}

impl BatchEnvelope {
    /// Validates `body` as a batch of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MalformedInput`] when the body is not an
    /// object, has neither `data` nor `batch`, holds a non-array there, or
    /// declares a `sync_type` for a different kind.
    pub fn parse(kind: SyncKind, body: Value) -> Result<Self, IngestError> {
        let Some(fields) = body.as_object() else {
            return Err(IngestError::MalformedInput(
                "batch body must be a JSON object".to_owned(),
            ));
        };

        let Some(records_key) = RECORD_KEYS
            .iter()
            .copied()
            .find(|k| fields.contains_key(*k))
        else {
            return Err(IngestError::MalformedInput(
                "batch has neither \"data\" nor \"batch\"".to_owned(),
            ));
        };

        if !fields[records_key].is_array() {
            return Err(IngestError::MalformedInput(format!(
                "\"{records_key}\" must be an array"
            )));
        }

        if let Some(declared) = fields.get("sync_type").filter(|v| !v.is_null()) {
            let declared_kind = declared
                .as_str()
                .ok_or_else(|| IngestError::MalformedInput("sync_type must be a string".into()))?
                .parse::<SyncKind>()?;
            if declared_kind != kind {
                return Err(IngestError::MalformedInput(format!(
                    "sync_type \"{declared_kind}\" does not match endpoint \"{kind}\""
                )));
            }
        }

        Ok(Self {
            kind,
            body,
            records_key,
        })
    }

    /// The records to process, in input order.
    #[must_use]
    pub fn records(&self) -> &[Value] {
        self.body[self.records_key]
            .as_array()
            .map_or(&[], Vec::as_slice)
    }

    /// The body exactly as received.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_and_batch_are_synonyms() {
        let a = BatchEnvelope::parse(SyncKind::Orders, json!({"data": [{}, {}]})).unwrap();
        let b = BatchEnvelope::parse(SyncKind::Orders, json!({"batch": [{}]})).unwrap();
        assert_eq!(a.records().len(), 2);
        assert_eq!(b.records().len(), 1);
    }

    #[test]
    fn missing_records_is_malformed() {
        let err = BatchEnvelope::parse(SyncKind::Orders, json!({"timestamp": "now"})).unwrap_err();
        assert!(matches!(err, IngestError::MalformedInput(_)));
    }

    #[test]
    fn non_array_records_is_malformed() {
        let err = BatchEnvelope::parse(SyncKind::Orders, json!({"data": {"id": 1}})).unwrap_err();
        assert!(matches!(err, IngestError::MalformedInput(_)));

        let err = BatchEnvelope::parse(SyncKind::Orders, json!([1, 2])).unwrap_err();
        assert!(matches!(err, IngestError::MalformedInput(_)));
    }

    #[test]
    fn sync_type_must_match_endpoint() {
        let ok = BatchEnvelope::parse(
            SyncKind::Products,
            json!({"data": [], "sync_type": "products"}),
        );
        assert!(ok.is_ok());

        let err = BatchEnvelope::parse(
            SyncKind::Products,
            json!({"data": [], "sync_type": "orders"}),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::MalformedInput(_)));
    }

    #[test]
    fn body_is_kept_verbatim() {
        let body = json!({"data": [{"post": {"id": 1}}], "timestamp": "2024-05-01T00:00:00Z"});
        let envelope = BatchEnvelope::parse(SyncKind::Orders, body.clone()).unwrap();
        assert_eq!(envelope.body(), &body);
    }

    #[test]
    fn kind_parses_singular_and_plural() {
        assert_eq!("order".parse::<SyncKind>().unwrap(), SyncKind::Orders);
        assert_eq!(
            "Customers".parse::<SyncKind>().unwrap(),
            SyncKind::Customers
        );
        assert!("refunds".parse::<SyncKind>().is_err());
    }
}
