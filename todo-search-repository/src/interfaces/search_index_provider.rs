//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (REST service, in-memory).

use async_trait::async_trait;
use serde_json::Value;
use todo_shared::{ItemSearchResults, SearchIndexEntry};

use crate::errors::SearchIndexError;
use crate::types::{BatchOperationSummary, ResourceKind};

/// Abstracts the underlying search index implementation.
///
/// Implementations are injected into `SearchIndexService`, `SearchProvisioner`
/// and the sync coordinator, which makes testing with mock implementations easy.
///
/// # Absence
///
/// A missing resource is not an error for `resource_exists`, `delete_all` and
/// document deletes. Queries against a missing index return empty results.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Full-text query returning the top results, the total match count, and
    /// tag and due-date-by-day facet tables.
    async fn search(&self, query: &str) -> Result<ItemSearchResults, SearchIndexError>;

    /// Fuzzy completions of a title prefix from the registered suggester.
    async fn suggest(&self, prefix: &str) -> Result<Vec<String>, SearchIndexError>;

    /// Trigger an immediate pass of the managed indexer.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the run was accepted
    /// * `Err(SearchIndexError::ResourceNotFound)` - If the indexer does not exist
    async fn run_indexer(&self) -> Result<(), SearchIndexError>;

    /// Reset the indexer and delete the indexer, data source and index.
    ///
    /// Every step is attempted even if an earlier one fails; absent resources
    /// count as deleted. The first failure, if any, is returned.
    async fn delete_all(&self) -> Result<(), SearchIndexError>;

    /// Whether a definition with the given name exists.
    async fn resource_exists(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<bool, SearchIndexError>;

    /// Create a definition. The name is taken from the definition's `name` field.
    async fn create_resource(
        &self,
        kind: ResourceKind,
        definition: &Value,
    ) -> Result<(), SearchIndexError>;

    /// Create or replace index entries (upsert), reporting per-document outcomes.
    async fn upsert_documents(
        &self,
        entries: &[SearchIndexEntry],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Remove index entries by key. Keys that are not indexed count as removed.
    async fn delete_documents(
        &self,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError>;
}
