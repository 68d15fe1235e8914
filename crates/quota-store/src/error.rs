//! Error types for quota storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A column family expected by this build is missing from the physical
    /// store. This is the schema-drift signature: callers run
    /// `repair_schema` and retry the operation once.
    #[error("missing column family: {name}")]
    MissingColumnFamily {
        /// The missing column family name.
        name: String,
    },
}

impl StoreError {
    /// Whether this error is the repairable schema-drift signature.
    #[must_use]
    pub const fn is_schema_drift(&self) -> bool {
        matches!(self, Self::MissingColumnFamily { .. })
    }
}
