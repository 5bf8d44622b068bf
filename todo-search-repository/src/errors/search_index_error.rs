//! Search index error types.
//!
//! This module defines the unified error type for all search index operations,
//! including both remote service failures and local validation errors.

use thiserror::Error;

/// Unified errors from search index operations.
///
/// Used by the `SearchIndexProvider` trait, `SearchIndexService` and
/// `SearchProvisioner`. A 404 from the search service is not an error for
/// existence checks and deletes; it only surfaces as `ResourceNotFound` when an
/// operation needs the resource to exist (for example running an indexer).
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., empty suggest prefix, malformed definition).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search service.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The search service answered with a non-success status other than 404.
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// A resource required by the operation does not exist.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Failed to parse a response from the search service.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize a request body.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The request exceeded its deadline.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a request failure carrying the response body as diagnostic text.
    pub fn request_failed(status: u16, body: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            body: body.into(),
        }
    }

    pub fn resource_not_found(msg: impl Into<String>) -> Self {
        Self::ResourceNotFound(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether the operation may be retried as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::TimeoutError(_) => true,
            Self::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SearchIndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::ConnectionError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchIndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
