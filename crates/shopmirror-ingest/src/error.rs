use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// A single record cannot be canonicalized. Reported per record; the
    /// rest of the batch carries on.
    #[error("invalid {entity} {id}: {reason}")]
    Validation {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// The batch envelope itself is unusable; nothing was processed.
    #[error("malformed batch: {0}")]
    MalformedInput(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Db(#[from] shopmirror_db::DbError),
}

impl IngestError {
    pub(crate) fn validation(
        entity: &'static str,
        id: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            entity,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
