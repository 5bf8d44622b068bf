//! Item store error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`ItemStore`](crate::ItemStore) operations.
///
/// `NotFound` and `Conflict` describe the target document and are surfaced
/// to callers as-is. `Timeout` is transient; it is only safe to retry for
/// idempotent operations (reads, existence checks), not for deletes.
#[derive(Debug, Error)]
pub enum ItemStoreError {
    /// Point read, replace or delete target does not exist.
    #[error("Item not found: id={id}, partition_key={partition_key}")]
    NotFound { id: String, partition_key: String },

    /// Create on an id that already exists within the partition.
    #[error("Item already exists: id={id}, partition_key={partition_key}")]
    Conflict { id: String, partition_key: String },

    /// Malformed input (empty id, id mismatch, unusable partition key value).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The backing collection could not be created or does not match the configuration.
    #[error("Provisioning error: {0}")]
    ProvisioningError(String),

    /// The backing store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The operation exceeded its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ItemStoreError {
    pub fn not_found(id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self::NotFound {
            id: id.into(),
            partition_key: partition_key.into(),
        }
    }

    pub fn conflict(id: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self::Conflict {
            id: id.into(),
            partition_key: partition_key.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::ProvisioningError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
