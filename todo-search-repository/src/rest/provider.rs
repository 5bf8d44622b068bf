//! REST implementation of the SearchIndexProvider trait.
//!
//! Talks to a hosted search service over HTTPS. Every request carries the
//! `api-key` header and the configured `api-version` query parameter.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use todo_shared::{ItemSearchResults, SearchIndexEntry};
use tracing::{debug, error, info};
use url::Url;

use crate::config::{SearchServiceConfig, SUGGESTER_NAME};
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::rest::responses::{IndexBatchResponse, SearchResponse, SuggestResponse};
use crate::types::{BatchOperationResult, BatchOperationSummary, ResourceKind};

/// Maximum number of documents the service accepts in one indexing request.
const DOCUMENT_BATCH_LIMIT: usize = 1000;

/// Search index provider backed by the search service's REST API.
///
/// # Example
///
/// ```ignore
/// let config = SearchServiceConfig::new("https://todo.search.windows.net", api_key)?;
/// let provider = RestSearchProvider::new(config)?;
/// let results = provider.search("milk").await?;
/// ```
pub struct RestSearchProvider {
    client: Client,
    config: SearchServiceConfig,
}

impl RestSearchProvider {
    /// Create a provider with a pooled HTTP client.
    ///
    /// # Returns
    ///
    /// * `Ok(RestSearchProvider)` - On success
    /// * `Err(SearchIndexError)` - If the api key is not a valid header value
    ///   or the HTTP client cannot be built
    pub fn new(config: SearchServiceConfig) -> Result<Self, SearchIndexError> {
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| SearchIndexError::validation("api key is not a valid header value"))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("api-key", api_key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(format!("failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SearchServiceConfig {
        &self.config
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.config.endpoint.clone();
        // The endpoint is validated as a base URL when the config is built.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("api-version", &self.config.api_version);
        }
        url
    }

    /// Send a request. A 404 is reported as `None`; other failures carry the
    /// response body.
    async fn execute(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Option<Response>, SearchIndexError> {
        let response = request.send().await.map_err(|e| {
            error!(operation, error = %e, "Search service request failed to send");
            SearchIndexError::from(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(operation, "Search service returned 404");
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                operation,
                status = status.as_u16(),
                body = %body,
                "Search service rejected request"
            );
            return Err(SearchIndexError::request_failed(status.as_u16(), body));
        }

        Ok(Some(response))
    }

    async fn reset_indexer(&self) -> Result<(), SearchIndexError> {
        let url = self.url(&["indexers", &self.config.names.indexer, "reset"], &[]);
        self.execute(self.client.post(url), "reset_indexer").await?;
        Ok(())
    }

    async fn delete_resource(&self, kind: ResourceKind, name: &str) -> Result<(), SearchIndexError> {
        let url = self.url(&[kind.collection(), name], &[]);
        match self.execute(self.client.delete(url), "delete_resource").await? {
            Some(_) => info!(kind = %kind, name, "Deleted search resource"),
            None => debug!(kind = %kind, name, "Search resource already absent"),
        }
        Ok(())
    }

    /// Submit one chunk of indexing actions.
    async fn index_batch(
        &self,
        actions: Vec<Value>,
        ids: &[String],
        is_delete: bool,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let url = self.url(&["indexes", &self.config.names.index, "docs", "index"], &[]);
        let body = json!({ "value": actions });

        match self.execute(self.client.post(url).json(&body), "index_documents").await? {
            Some(response) => {
                let batch: IndexBatchResponse = response.json().await?;
                Ok(batch.into_summary(is_delete))
            }
            None if is_delete => {
                debug!(count = ids.len(), "Index absent; nothing to delete");
                Ok(BatchOperationSummary::from_results(
                    ids.iter().map(BatchOperationResult::succeeded).collect(),
                ))
            }
            None => Err(SearchIndexError::resource_not_found(format!(
                "index '{}'",
                self.config.names.index
            ))),
        }
    }
}

#[async_trait]
impl SearchIndexProvider for RestSearchProvider {
    async fn search(&self, query: &str) -> Result<ItemSearchResults, SearchIndexError> {
        let top = self.config.search_top.to_string();
        let url = self.url(
            &["indexes", &self.config.names.index, "docs"],
            &[
                ("facet", "dueDate,interval:day"),
                ("facet", "tags"),
                ("$count", "true"),
                ("$top", &top),
                ("search", query),
            ],
        );

        match self.execute(self.client.get(url), "search").await? {
            Some(response) => {
                let body: SearchResponse = response.json().await?;
                let results = body.into_results();
                debug!(query, total = results.total_count, "Search completed");
                Ok(results)
            }
            None => Err(SearchIndexError::resource_not_found(format!(
                "index '{}'",
                self.config.names.index
            ))),
        }
    }

    async fn suggest(&self, prefix: &str) -> Result<Vec<String>, SearchIndexError> {
        let top = self.config.suggest_top.to_string();
        let url = self.url(
            &["indexes", &self.config.names.index, "docs", "suggest"],
            &[
                ("suggesterName", SUGGESTER_NAME),
                ("$top", &top),
                ("searchFields", "title"),
                ("fuzzy", "true"),
                ("search", prefix),
            ],
        );

        match self.execute(self.client.get(url), "suggest").await? {
            Some(response) => {
                let body: SuggestResponse = response.json().await?;
                Ok(body.into_texts())
            }
            None => Err(SearchIndexError::resource_not_found(format!(
                "index '{}'",
                self.config.names.index
            ))),
        }
    }

    async fn run_indexer(&self) -> Result<(), SearchIndexError> {
        let name = &self.config.names.indexer;
        let url = self.url(&["indexers", name, "run"], &[]);

        match self.execute(self.client.post(url), "run_indexer").await? {
            Some(_) => {
                info!(indexer = %name, "Indexer run requested");
                Ok(())
            }
            None => Err(SearchIndexError::resource_not_found(format!("indexer '{}'", name))),
        }
    }

    async fn delete_all(&self) -> Result<(), SearchIndexError> {
        let names = &self.config.names;
        let outcomes = [
            ("reset indexer", self.reset_indexer().await),
            (
                "delete indexer",
                self.delete_resource(ResourceKind::Indexer, &names.indexer).await,
            ),
            (
                "delete data source",
                self.delete_resource(ResourceKind::DataSource, &names.datasource).await,
            ),
            (
                "delete index",
                self.delete_resource(ResourceKind::Index, &names.index).await,
            ),
        ];

        let mut first_error = None;
        for (step, outcome) in outcomes {
            if let Err(e) = outcome {
                error!(step, error = %e, "Search teardown step failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Search resources deleted");
                Ok(())
            }
        }
    }

    async fn resource_exists(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<bool, SearchIndexError> {
        let url = self.url(&[kind.collection(), name], &[]);
        Ok(self.execute(self.client.get(url), "resource_exists").await?.is_some())
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        definition: &Value,
    ) -> Result<(), SearchIndexError> {
        let name = definition
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SearchIndexError::validation(format!("{} definition has no name", kind)))?;
        let url = self.url(&[kind.collection()], &[]);

        match self.execute(self.client.post(url).json(definition), "create_resource").await? {
            Some(_) => {
                info!(kind = %kind, name, "Created search resource");
                Ok(())
            }
            None => Err(SearchIndexError::resource_not_found(format!(
                "{} collection for '{}'",
                kind, name
            ))),
        }
    }

    async fn upsert_documents(
        &self,
        entries: &[SearchIndexEntry],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let mut summary = BatchOperationSummary::empty();

        for chunk in entries.chunks(DOCUMENT_BATCH_LIMIT) {
            let mut actions = Vec::with_capacity(chunk.len());
            for entry in chunk {
                let mut action = serde_json::to_value(entry)?;
                if let Value::Object(fields) = &mut action {
                    fields.insert("@search.action".to_string(), json!("mergeOrUpload"));
                }
                actions.push(action);
            }
            let ids: Vec<String> = chunk.iter().map(|e| e.id.clone()).collect();
            summary.extend(self.index_batch(actions, &ids, false).await?);
        }

        debug!(
            total = summary.total,
            failed = summary.failed,
            "Upserted index entries"
        );
        Ok(summary)
    }

    async fn delete_documents(
        &self,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let mut summary = BatchOperationSummary::empty();

        for chunk in ids.chunks(DOCUMENT_BATCH_LIMIT) {
            let actions = chunk
                .iter()
                .map(|id| json!({ "@search.action": "delete", "id": id }))
                .collect();
            summary.extend(self.index_batch(actions, chunk, true).await?);
        }

        debug!(
            total = summary.total,
            failed = summary.failed,
            "Deleted index entries"
        );
        Ok(summary)
    }
}
