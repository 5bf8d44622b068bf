//! Change scanner for the sync coordinator.
//!
//! Reads the documents modified since the last watermark, widened by an
//! overlap window, together with the set of live item ids.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use todo_shared::ItemDocument;
use todo_store_repository::ItemStore;
use tracing::{debug, instrument};

use crate::errors::SyncError;

/// Everything a cycle read from the store.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Documents with `_ts` past the scan start, ascending by `_ts`.
    pub documents: Vec<ItemDocument>,
    /// Ids of every document currently in the store.
    pub live_ids: HashSet<String>,
    /// Highest `_ts` among the scanned documents.
    pub max_ts: Option<i64>,
}

/// Reads changes from the item store.
pub struct ChangeScanner {
    store: Arc<dyn ItemStore>,
    overlap: Duration,
}

impl ChangeScanner {
    pub fn new(store: Arc<dyn ItemStore>, overlap: Duration) -> Self {
        Self { store, overlap }
    }

    /// Store timestamps are microseconds; the overlap is converted to match.
    fn scan_start(&self, watermark: i64) -> i64 {
        let overlap = i64::try_from(self.overlap.as_micros()).unwrap_or(i64::MAX);
        watermark.saturating_sub(overlap)
    }

    /// Scan documents changed after `watermark - overlap`, then the live key set.
    ///
    /// The key set is read second, so a document deleted between the two reads
    /// is absent from `live_ids` and treated as deleted.
    #[instrument(skip(self))]
    pub async fn scan(&self, watermark: i64) -> Result<ScanResult, SyncError> {
        let since = self.scan_start(watermark);
        let documents = self.store.changed_since(since).await?;
        let live_ids: HashSet<String> = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .map(|key| key.id)
            .collect();
        let max_ts = documents.iter().map(|d| d.ts).max();

        debug!(
            since,
            changed = documents.len(),
            live = live_ids.len(),
            "Scanned item store"
        );
        Ok(ScanResult {
            documents,
            live_ids,
            max_ts,
        })
    }
}
