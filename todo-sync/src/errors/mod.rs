//! Error types for the sync coordinator.

use std::time::Duration;

use thiserror::Error;
use todo_search_repository::SearchIndexError;
use todo_store_repository::{ItemStoreError, SyncStateError};

/// Errors that can occur during a sync cycle.
///
/// None of these leave partial progress behind: the watermark and ledger are
/// only committed after a cycle fully succeeds.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Reading from the item store failed.
    #[error("Store error: {0}")]
    StoreError(#[from] ItemStoreError),

    /// Loading or committing the watermark and ledger failed.
    #[error("Sync state error: {0}")]
    StateError(#[from] SyncStateError),

    /// A request to the search service failed as a whole.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// Some documents were rejected by the search service.
    #[error("Sync partially failed: {failed} of {attempted} documents ({first_error})")]
    PartialFailure {
        attempted: usize,
        failed: usize,
        first_error: String,
    },

    /// Error fingerprinting a projection.
    #[error("Processing error: {0}")]
    ProcessingError(String),

    /// Another process holds the sync state for this coordinator id.
    #[error("Sync state for '{0}' is leased by another process")]
    LeaseHeld(String),

    /// The cycle exceeded its deadline.
    #[error("Sync cycle timed out after {0:?}")]
    Timeout(Duration),

    /// The coordinator task is gone.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl SyncError {
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::ProcessingError(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    pub fn partial_failure(attempted: usize, failed: usize, first_error: impl Into<String>) -> Self {
        Self::PartialFailure {
            attempted,
            failed,
            first_error: first_error.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::ProcessingError(err.to_string())
    }
}
