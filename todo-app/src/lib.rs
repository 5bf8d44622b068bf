//! # Searchable To-Do
//!
//! HTTP service for a to-do list whose items live in a partitioned document
//! store and are mirrored into a full-text search index.
//!
//! ## Modules
//!
//! - [`config`]: Environment configuration and dependency initialization
//! - [`server`]: Routes, handlers and HTTP error mapping

pub mod config;
pub mod server;

pub use config::{AppConfig, Dependencies};

use thiserror::Error;
use todo_search_repository::SearchIndexError;
use todo_store_repository::{ItemStoreError, SyncStateError};

/// Errors that can occur during startup.
///
/// Any of these halts the process before the listener binds.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The store, index or indexer could not be provisioned.
    #[error("Provisioning error: {0}")]
    ProvisioningError(String),

    #[error("Store error: {0}")]
    StoreError(#[from] ItemStoreError),

    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    #[error("Sync state error: {0}")]
    SyncStateError(#[from] SyncStateError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a provisioning error.
    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::ProvisioningError(msg.into())
    }
}
