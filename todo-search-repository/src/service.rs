//! Search index service implementation.
//!
//! This module provides the service the application queries through. It
//! validates input and delegates to a `SearchIndexProvider` for the backend
//! operations.

use std::sync::Arc;

use todo_shared::{ItemSearchResults, SearchIndexEntry};

use crate::config::SearchIndexServiceConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::BatchOperationSummary;

/// The main service for interacting with the search index.
///
/// This is the high-level API that application code should use. All operations
/// return `SearchIndexError` for consistent error handling.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use todo_search_repository::{InMemorySearchProvider, SearchIndexService};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = SearchIndexService::new(Arc::new(InMemorySearchProvider::default()));
///
/// let results = service.search("milk").await?;
/// println!("{} matches", results.total_count);
/// # Ok(())
/// # }
/// ```
pub struct SearchIndexService {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchIndexServiceConfig,
}

impl SearchIndexService {
    /// Create a new SearchIndexService with default configuration.
    ///
    /// The default configuration includes a batch size limit of 1000 documents.
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexServiceConfig::default(),
        }
    }

    /// Create a new SearchIndexService with custom configuration.
    pub fn with_config(
        provider: Arc<dyn SearchIndexProvider>,
        config: SearchIndexServiceConfig,
    ) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<dyn SearchIndexProvider> {
        &self.provider
    }

    /// Largest batch `upsert_batch` and `delete_batch` accept, if limited.
    pub fn max_batch_size(&self) -> Option<usize> {
        self.config.max_batch_size
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Run a full-text query over title, description and tags.
    ///
    /// A blank query matches every item.
    ///
    /// # Returns
    ///
    /// * `Ok(ItemSearchResults)` - Top matches, the total count and facet tables
    /// * `Err(SearchIndexError::ResourceNotFound)` - If the index does not exist
    /// * `Err(SearchIndexError::ValidationError)` - If the query is too long
    /// * `Err(SearchIndexError)` - If the search service fails
    pub async fn search(&self, query: &str) -> Result<ItemSearchResults, SearchIndexError> {
        let query = query.trim();
        if query.chars().count() > self.config.max_query_length {
            return Err(SearchIndexError::validation(format!(
                "query must be at most {} characters",
                self.config.max_query_length
            )));
        }

        let query = if query.is_empty() { "*" } else { query };
        self.provider.search(query).await
    }

    /// Suggest item titles completing the given prefix.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Suggested titles, possibly empty
    /// * `Err(SearchIndexError::ValidationError)` - If the prefix is blank or too long
    pub async fn suggest(&self, prefix: &str) -> Result<Vec<String>, SearchIndexError> {
        let prefix = prefix.trim();
        let length = prefix.chars().count();
        if length == 0 {
            return Err(SearchIndexError::validation("suggest prefix is required"));
        }
        if length > self.config.max_suggest_prefix {
            return Err(SearchIndexError::validation(format!(
                "suggest prefix must be at most {} characters",
                self.config.max_suggest_prefix
            )));
        }

        self.provider.suggest(prefix).await
    }

    /// Create or replace index entries.
    ///
    /// Individual document failures are reported in the summary rather than
    /// failing the whole call.
    pub async fn upsert_batch(
        &self,
        entries: &[SearchIndexEntry],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if entries.is_empty() {
            return Ok(BatchOperationSummary::empty());
        }

        self.validate_batch_size(entries.len())?;

        if entries.iter().any(|e| e.id.is_empty()) {
            return Err(SearchIndexError::validation("index entry id is required"));
        }

        self.provider.upsert_documents(entries).await
    }

    /// Remove index entries by id. Ids that are not indexed count as removed.
    pub async fn delete_batch(
        &self,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if ids.is_empty() {
            return Ok(BatchOperationSummary::empty());
        }

        self.validate_batch_size(ids.len())?;
        self.provider.delete_documents(ids).await
    }

    pub async fn run_indexer(&self) -> Result<(), SearchIndexError> {
        self.provider.run_indexer().await
    }

    pub async fn delete_all(&self) -> Result<(), SearchIndexError> {
        self.provider.delete_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchOperationResult, ResourceKind};
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Mutex;

    /// Mock provider recording the arguments it receives.
    #[derive(Default)]
    struct MockProvider {
        queries: Arc<Mutex<Vec<String>>>,
        prefixes: Arc<Mutex<Vec<String>>>,
        upserted: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SearchIndexProvider for MockProvider {
        async fn search(&self, query: &str) -> Result<ItemSearchResults, SearchIndexError> {
            self.queries.lock().await.push(query.to_string());
            Ok(ItemSearchResults::empty())
        }

        async fn suggest(&self, prefix: &str) -> Result<Vec<String>, SearchIndexError> {
            self.prefixes.lock().await.push(prefix.to_string());
            Ok(vec![format!("{} suggestion", prefix)])
        }

        async fn run_indexer(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn delete_all(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn resource_exists(
            &self,
            _kind: ResourceKind,
            _name: &str,
        ) -> Result<bool, SearchIndexError> {
            Ok(true)
        }

        async fn create_resource(
            &self,
            _kind: ResourceKind,
            _definition: &Value,
        ) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn upsert_documents(
            &self,
            entries: &[SearchIndexEntry],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            let mut upserted = self.upserted.lock().await;
            let results = entries
                .iter()
                .map(|e| {
                    upserted.push(e.id.clone());
                    BatchOperationResult::succeeded(&e.id)
                })
                .collect();
            Ok(BatchOperationSummary::from_results(results))
        }

        async fn delete_documents(
            &self,
            ids: &[String],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            Ok(BatchOperationSummary::from_results(
                ids.iter().map(BatchOperationResult::succeeded).collect(),
            ))
        }
    }

    fn entry(id: &str) -> SearchIndexEntry {
        SearchIndexEntry::from(&todo_shared::Item::new("x").with_id(id))
    }

    #[tokio::test]
    async fn test_blank_query_matches_everything() {
        let mock = Arc::new(MockProvider::default());
        let service = SearchIndexService::new(mock.clone());

        service.search("   ").await.unwrap();
        service.search(" milk ").await.unwrap();

        assert_eq!(*mock.queries.lock().await, vec!["*", "milk"]);
    }

    #[tokio::test]
    async fn test_suggest_validation() {
        let mock = Arc::new(MockProvider::default());
        let service = SearchIndexService::new(mock.clone());

        assert!(matches!(
            service.suggest("  ").await,
            Err(SearchIndexError::ValidationError(_))
        ));
        assert!(matches!(
            service.suggest(&"a".repeat(101)).await,
            Err(SearchIndexError::ValidationError(_))
        ));
        assert_eq!(service.suggest("mi").await.unwrap(), vec!["mi suggestion"]);
        assert_eq!(*mock.prefixes.lock().await, vec!["mi"]);
    }

    #[tokio::test]
    async fn test_upsert_batch_empty() {
        let mock = Arc::new(MockProvider::default());
        let service = SearchIndexService::new(mock.clone());

        let summary = service.upsert_batch(&[]).await.unwrap();

        assert_eq!(summary.total, 0);
        assert!(mock.upserted.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_limit() {
        let mock = Arc::new(MockProvider::default());
        let service = SearchIndexService::with_config(
            mock.clone(),
            SearchIndexServiceConfig::with_max_batch_size(2),
        );

        let result = service
            .upsert_batch(&[entry("a"), entry("b"), entry("c")])
            .await;
        assert!(matches!(
            result,
            Err(SearchIndexError::BatchSizeExceeded { provided: 3, max: 2 })
        ));

        let summary = service.upsert_batch(&[entry("a"), entry("b")]).await.unwrap();
        assert_eq!(summary.succeeded, 2);
    }

    #[tokio::test]
    async fn test_batch_size_unlimited() {
        let mock = Arc::new(MockProvider::default());
        let service =
            SearchIndexService::with_config(mock.clone(), SearchIndexServiceConfig::unlimited());
        let ids: Vec<String> = (0..1500).map(|i| i.to_string()).collect();

        let summary = service.delete_batch(&ids).await.unwrap();

        assert_eq!(summary.total, 1500);
    }
}
