//! Request and response types for search index operations.

use crate::errors::SearchIndexError;

/// Kinds of definitions managed on the search service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Index,
    DataSource,
    Indexer,
}

impl ResourceKind {
    /// Collection path segment on the REST surface.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Index => "indexes",
            ResourceKind::DataSource => "datasources",
            ResourceKind::Indexer => "indexers",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Index => "index",
            ResourceKind::DataSource => "data source",
            ResourceKind::Indexer => "indexer",
        };
        f.write_str(name)
    }
}

/// Result of a batch operation for a single document.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document key (item id).
    pub id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

impl BatchOperationResult {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: SearchIndexError) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This allows callers to handle partial failures: the batch as a whole was
/// accepted, but individual documents may have been rejected.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of documents in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each document.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Merge another summary into this one.
    pub fn extend(&mut self, other: BatchOperationSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.results.extend(other.results);
    }

    /// Ids of documents that failed.
    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.id.as_str())
    }
}
