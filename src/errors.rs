use thiserror::Error;

/// Error types for record construction and serialization
#[derive(Error, Debug)]
pub enum RecordError {
    /// A field was assigned a value that violates its type invariant.
    /// Raised at the point of assignment; the invalid value is never stored.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// as_dict/as_json was asked for a schema version this record type
    /// does not know
    #[error("unknown record schema version: {0}")]
    UnknownSchemaVersion(String),

    /// Error during record serialization
    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}
