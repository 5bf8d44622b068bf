//! Loader module for the sync coordinator.
//!
//! Applies a sync plan to the search index in bounded batches.

use std::sync::Arc;

use todo_search_repository::{BatchOperationSummary, SearchIndexService};
use todo_shared::SearchIndexEntry;
use tracing::{debug, instrument, warn};

use crate::errors::SyncError;
use crate::processor::SyncPlan;

/// Configuration for the search loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of documents sent per request.
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

/// Counts of what a plan wrote to the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub upserted: usize,
    pub deleted: usize,
}

/// Loader that writes plans into the search index.
///
/// Writes go through `SearchIndexService`, so batches never exceed the
/// service's batch limit.
pub struct SearchLoader {
    search: Arc<SearchIndexService>,
    config: LoaderConfig,
}

impl SearchLoader {
    /// Create a new search loader writing through the given service.
    pub fn new(search: Arc<SearchIndexService>) -> Self {
        Self::with_config(search, LoaderConfig::default())
    }

    pub fn with_config(search: Arc<SearchIndexService>, config: LoaderConfig) -> Self {
        let limit = search.max_batch_size().unwrap_or(usize::MAX);
        let batch_size = config.batch_size.min(limit).max(1);
        Self {
            search,
            config: LoaderConfig { batch_size },
        }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Upsert the plan's projections, then delete its removed ids.
    ///
    /// Every batch is attempted. If any document fails the whole plan is
    /// reported as a partial failure so the caller does not commit it.
    #[instrument(skip_all, fields(upserts = plan.upserts.len(), deletes = plan.deletes.len()))]
    pub async fn apply(&self, plan: &SyncPlan) -> Result<LoadOutcome, SyncError> {
        let mut summary = BatchOperationSummary::empty();
        let mut request_error = None;

        let entries: Vec<SearchIndexEntry> = plan.upserts.iter().map(|u| u.entry.clone()).collect();
        for chunk in entries.chunks(self.config.batch_size) {
            match self.search.upsert_batch(chunk).await {
                Ok(batch) => summary.extend(batch),
                Err(e) => {
                    warn!(error = %e, count = chunk.len(), "Upsert batch failed");
                    request_error.get_or_insert(e);
                }
            }
        }

        for chunk in plan.deletes.chunks(self.config.batch_size) {
            match self.search.delete_batch(chunk).await {
                Ok(batch) => summary.extend(batch),
                Err(e) => {
                    warn!(error = %e, count = chunk.len(), "Delete batch failed");
                    request_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = request_error {
            return Err(SyncError::from(e));
        }

        if summary.failed > 0 {
            let first_error = summary
                .results
                .iter()
                .find(|r| !r.success)
                .and_then(|r| r.error.as_ref())
                .map(|e| e.to_string())
                .unwrap_or_default();
            for id in summary.failed_ids() {
                warn!(item_id = id, "Search service rejected document");
            }
            return Err(SyncError::partial_failure(
                summary.total,
                summary.failed,
                first_error,
            ));
        }

        let outcome = LoadOutcome {
            upserted: plan.upserts.len(),
            deleted: plan.deletes.len(),
        };
        debug!(
            upserted = outcome.upserted,
            deleted = outcome.deleted,
            "Applied sync plan"
        );
        Ok(outcome)
    }
}
