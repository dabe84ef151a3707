//! Error types for ledger storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A write precondition did not hold; nothing was written.
    #[error("conditional check failed on {table} (write {index})")]
    ConditionalCheckFailed {
        /// Table of the write whose condition failed.
        table: &'static str,
        /// Position of that write within the request.
        index: usize,
    },

    /// The request itself was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// Whether this error is a failed precondition.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed { .. })
    }
}
