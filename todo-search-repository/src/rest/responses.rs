//! Wire types for search service responses.

use serde::Deserialize;
use serde_json::Value;
use todo_shared::{FacetCount, ItemSearchResults, SearchIndexEntry};
use tracing::warn;

use crate::types::{BatchOperationResult, BatchOperationSummary};
use crate::errors::SearchIndexError;

/// Body of a search query response.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(rename = "@odata.count", default)]
    pub count: Option<u64>,
    #[serde(rename = "@search.facets", default)]
    pub facets: Option<Value>,
    #[serde(default)]
    pub value: Vec<SearchIndexEntry>,
}

impl SearchResponse {
    pub(crate) fn into_results(self) -> ItemSearchResults {
        let tag_counts = facet_table(self.facets.as_ref(), "tags");
        let date_counts = facet_table(self.facets.as_ref(), "dueDate");
        let total_count = self.count.unwrap_or(self.value.len() as u64);

        ItemSearchResults {
            total_count,
            items: self.value.into_iter().map(SearchIndexEntry::into_item).collect(),
            tag_counts,
            date_counts,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FacetBucket {
    value: Value,
    count: u64,
}

/// Read one facet table. A missing table is empty; a malformed one is logged
/// and treated as empty so the matches are still returned.
fn facet_table(facets: Option<&Value>, field: &str) -> Vec<FacetCount> {
    let Some(table) = facets.and_then(|f| f.get(field)) else {
        return Vec::new();
    };

    match serde_json::from_value::<Vec<FacetBucket>>(table.clone()) {
        Ok(buckets) => buckets
            .into_iter()
            .map(|bucket| {
                let value = match bucket.value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                FacetCount::new(value, bucket.count)
            })
            .collect(),
        Err(e) => {
            warn!(facet = field, error = %e, "Ignoring malformed facet table");
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(rename = "@search.text")]
    text: String,
}

/// Body of a suggest response.
#[derive(Debug, Deserialize)]
pub(crate) struct SuggestResponse {
    #[serde(default)]
    value: Vec<Suggestion>,
}

impl SuggestResponse {
    pub(crate) fn into_texts(self) -> Vec<String> {
        self.value.into_iter().map(|s| s.text).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(default)]
    error_message: Option<String>,
    status_code: u16,
}

/// Body of a document batch response, one entry per submitted document.
#[derive(Debug, Deserialize)]
pub(crate) struct IndexBatchResponse {
    #[serde(default)]
    value: Vec<IndexingResult>,
}

impl IndexBatchResponse {
    /// Convert per-document statuses into a summary. With `missing_is_success`
    /// a 404 for a document counts as done (deleting an absent key).
    pub(crate) fn into_summary(self, missing_is_success: bool) -> BatchOperationSummary {
        let results = self
            .value
            .into_iter()
            .map(|r| {
                if r.status || (missing_is_success && r.status_code == 404) {
                    BatchOperationResult::succeeded(r.key)
                } else {
                    let message = r
                        .error_message
                        .unwrap_or_else(|| format!("document rejected with status {}", r.status_code));
                    BatchOperationResult::failed(
                        r.key,
                        SearchIndexError::request_failed(r.status_code, message),
                    )
                }
            })
            .collect();
        BatchOperationSummary::from_results(results)
    }
}
