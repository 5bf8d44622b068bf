//! In-memory implementation of the SearchIndexProvider trait.
//!
//! Used by the local profile and by tests across the workspace. Matching is a
//! simple case-insensitive token match over the searchable fields.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use todo_shared::{FacetCount, ItemSearchResults, SearchIndexEntry};
use tracing::debug;

use crate::config::{SearchResourceNames, DEFAULT_SEARCH_TOP, DEFAULT_SUGGEST_TOP};
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BatchOperationResult, BatchOperationSummary, ResourceKind};

#[derive(Default)]
struct State {
    documents: BTreeMap<String, SearchIndexEntry>,
    resources: HashMap<(ResourceKind, String), Value>,
}

/// Search provider holding definitions and documents in process memory.
pub struct InMemorySearchProvider {
    names: SearchResourceNames,
    state: Mutex<State>,
    create_calls: AtomicUsize,
    exists_calls: AtomicUsize,
    indexer_runs: AtomicUsize,
    failing_ids: Mutex<HashSet<String>>,
    fail_all_writes: AtomicBool,
}

impl Default for InMemorySearchProvider {
    fn default() -> Self {
        Self::new(SearchResourceNames::default())
    }
}

impl InMemorySearchProvider {
    pub fn new(names: SearchResourceNames) -> Self {
        Self {
            names,
            state: Mutex::new(State::default()),
            create_calls: AtomicUsize::new(0),
            exists_calls: AtomicUsize::new(0),
            indexer_runs: AtomicUsize::new(0),
            failing_ids: Mutex::new(HashSet::new()),
            fail_all_writes: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, SearchIndexError> {
        self.state
            .lock()
            .map_err(|_| SearchIndexError::unknown("search state lock poisoned"))
    }

    /// Number of `create_resource` calls made so far.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    /// Number of `resource_exists` calls made so far.
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::Relaxed)
    }

    pub fn indexer_runs(&self) -> usize {
        self.indexer_runs.load(Ordering::Relaxed)
    }

    /// Reject every future write of the given document id.
    pub fn fail_document(&self, id: impl Into<String>) {
        if let Ok(mut ids) = self.failing_ids.lock() {
            ids.insert(id.into());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut ids) = self.failing_ids.lock() {
            ids.clear();
        }
        self.fail_all_writes.store(false, Ordering::SeqCst);
    }

    /// Make document writes fail as if the service were unreachable.
    pub fn set_fail_all_writes(&self, fail: bool) {
        self.fail_all_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of an indexed document.
    pub fn document(&self, id: &str) -> Option<SearchIndexEntry> {
        self.state.lock().ok()?.documents.get(id).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.state.lock().map(|s| s.documents.len()).unwrap_or(0)
    }

    pub fn has_resource(&self, kind: ResourceKind, name: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.resources.contains_key(&(kind, name.to_string())))
            .unwrap_or(false)
    }

    fn is_failing(&self, id: &str) -> bool {
        self.failing_ids
            .lock()
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    fn check_writable(&self) -> Result<(), SearchIndexError> {
        if self.fail_all_writes.load(Ordering::SeqCst) {
            return Err(SearchIndexError::connection("search service unavailable"));
        }
        Ok(())
    }

    fn index_exists(&self, state: &State) -> bool {
        state
            .resources
            .contains_key(&(ResourceKind::Index, self.names.index.clone()))
    }

    fn require_index(&self, state: &State) -> Result<(), SearchIndexError> {
        if self.index_exists(state) {
            Ok(())
        } else {
            Err(SearchIndexError::resource_not_found(format!(
                "index '{}'",
                self.names.index
            )))
        }
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Number of distinct query terms that appear in the entry's searchable fields.
fn match_score(entry: &SearchIndexEntry, terms: &[String]) -> usize {
    let mut haystack: HashSet<String> = tokens(&entry.title).into_iter().collect();
    haystack.extend(tokens(&entry.description));
    for tag in &entry.tags {
        haystack.extend(tokens(tag));
    }
    terms.iter().filter(|t| haystack.contains(*t)).count()
}

fn day_bucket(entry: &SearchIndexEntry) -> Option<String> {
    entry
        .due_date
        .map(|d| d.format("%Y-%m-%dT00:00:00Z").to_string())
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchProvider {
    async fn search(&self, query: &str) -> Result<ItemSearchResults, SearchIndexError> {
        let state = self.lock()?;
        self.require_index(&state)?;

        let query = query.trim();
        let match_all = query.is_empty() || query == "*";
        let terms: Vec<String> = {
            let mut seen = HashSet::new();
            tokens(query).into_iter().filter(|t| seen.insert(t.clone())).collect()
        };

        let mut matches: Vec<(usize, &SearchIndexEntry)> = state
            .documents
            .values()
            .filter_map(|entry| {
                if match_all {
                    return Some((0, entry));
                }
                let score = match_score(entry, &terms);
                (score > 0).then_some((score, entry))
            })
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.title.cmp(&b.1.title)));

        let mut tag_counts: BTreeMap<&str, u64> = BTreeMap::new();
        let mut date_counts: BTreeMap<String, u64> = BTreeMap::new();
        for (_, entry) in &matches {
            for tag in &entry.tags {
                *tag_counts.entry(tag.as_str()).or_default() += 1;
            }
            if let Some(day) = day_bucket(entry) {
                *date_counts.entry(day).or_default() += 1;
            }
        }

        let mut tag_counts: Vec<FacetCount> = tag_counts
            .into_iter()
            .map(|(tag, count)| FacetCount::new(tag, count))
            .collect();
        tag_counts.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(ItemSearchResults {
            total_count: matches.len() as u64,
            items: matches
                .iter()
                .take(DEFAULT_SEARCH_TOP)
                .map(|(_, entry)| (*entry).clone().into_item())
                .collect(),
            tag_counts,
            date_counts: date_counts
                .into_iter()
                .map(|(day, count)| FacetCount::new(day, count))
                .collect(),
        })
    }

    async fn suggest(&self, prefix: &str) -> Result<Vec<String>, SearchIndexError> {
        let state = self.lock()?;
        self.require_index(&state)?;

        let prefix = prefix.trim().to_lowercase();
        Ok(state
            .documents
            .values()
            .filter(|entry| tokens(&entry.title).iter().any(|w| w.starts_with(&prefix)))
            .map(|entry| entry.title.clone())
            .take(DEFAULT_SUGGEST_TOP)
            .collect())
    }

    async fn run_indexer(&self) -> Result<(), SearchIndexError> {
        let state = self.lock()?;
        if !state
            .resources
            .contains_key(&(ResourceKind::Indexer, self.names.indexer.clone()))
        {
            return Err(SearchIndexError::resource_not_found(format!(
                "indexer '{}'",
                self.names.indexer
            )));
        }
        self.indexer_runs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), SearchIndexError> {
        let mut state = self.lock()?;
        state.documents.clear();
        state.resources.clear();
        debug!("Cleared in-memory search resources");
        Ok(())
    }

    async fn resource_exists(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<bool, SearchIndexError> {
        self.exists_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.lock()?.resources.contains_key(&(kind, name.to_string())))
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        definition: &Value,
    ) -> Result<(), SearchIndexError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        let name = definition
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SearchIndexError::validation(format!("{} definition has no name", kind)))?;

        let mut state = self.lock()?;
        let key = (kind, name.to_string());
        if state.resources.contains_key(&key) {
            return Err(SearchIndexError::request_failed(
                409,
                format!("{} '{}' already exists", kind, name),
            ));
        }
        state.resources.insert(key, definition.clone());
        Ok(())
    }

    async fn upsert_documents(
        &self,
        entries: &[SearchIndexEntry],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.check_writable()?;
        let mut state = self.lock()?;
        self.require_index(&state)?;

        let results = entries
            .iter()
            .map(|entry| {
                if self.is_failing(&entry.id) {
                    BatchOperationResult::failed(
                        &entry.id,
                        SearchIndexError::request_failed(400, "document rejected"),
                    )
                } else {
                    state.documents.insert(entry.id.clone(), entry.clone());
                    BatchOperationResult::succeeded(&entry.id)
                }
            })
            .collect();
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn delete_documents(
        &self,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.check_writable()?;
        let mut state = self.lock()?;

        let results = ids
            .iter()
            .map(|id| {
                if self.is_failing(id) {
                    BatchOperationResult::failed(
                        id,
                        SearchIndexError::request_failed(400, "document rejected"),
                    )
                } else {
                    state.documents.remove(id);
                    BatchOperationResult::succeeded(id)
                }
            })
            .collect();
        Ok(BatchOperationSummary::from_results(results))
    }
}
