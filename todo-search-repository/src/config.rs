//! Configuration types for the search repository.

use std::time::Duration;

use url::Url;

use crate::errors::SearchIndexError;

/// Default REST API version appended to every request.
pub const DEFAULT_API_VERSION: &str = "2019-05-06";

/// Default number of results returned by a search.
pub const DEFAULT_SEARCH_TOP: usize = 15;

/// Default number of suggestions returned.
pub const DEFAULT_SUGGEST_TOP: usize = 10;

/// Name of the suggester registered with the index.
pub const SUGGESTER_NAME: &str = "sg";

/// Default indexer schedule (ISO-8601 duration).
pub const DEFAULT_INDEXER_INTERVAL: &str = "PT5M";

/// Default data source type for the managed indexer.
pub const DEFAULT_DATASOURCE_TYPE: &str = "documentdb";

/// Names of the definitions managed on the search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResourceNames {
    pub index: String,
    pub indexer: String,
    pub datasource: String,
}

impl Default for SearchResourceNames {
    fn default() -> Self {
        Self {
            index: "todo".to_string(),
            indexer: "todo-indexer".to_string(),
            datasource: "todo-datasource".to_string(),
        }
    }
}

/// Where the managed indexer reads items from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Data source type understood by the search service.
    pub kind: String,
    /// Connection string of the item store, as the search service expects it.
    pub connection_string: String,
    /// Collection (container) holding the items.
    pub container: String,
    /// Monotonically increasing modification timestamp column.
    pub high_water_mark_column: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            kind: DEFAULT_DATASOURCE_TYPE.to_string(),
            connection_string: String::new(),
            container: "items".to_string(),
            high_water_mark_column: "_ts".to_string(),
        }
    }
}

/// Connection settings for the search service.
#[derive(Debug, Clone)]
pub struct SearchServiceConfig {
    /// Base URL of the search service.
    pub endpoint: Url,
    /// Static credential sent in the `api-key` header.
    pub api_key: String,
    pub api_version: String,
    pub names: SearchResourceNames,
    pub datasource: DataSourceConfig,
    /// Deadline for a single request.
    pub request_timeout: Duration,
    /// Maximum number of results per search.
    pub search_top: usize,
    /// Maximum number of suggestions.
    pub suggest_top: usize,
    /// Indexer schedule as an ISO-8601 duration.
    pub indexer_interval: String,
}

impl SearchServiceConfig {
    /// Create a configuration with default names and limits.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchServiceConfig)` - If the endpoint is an absolute http(s) URL
    /// * `Err(SearchIndexError::ValidationError)` - Otherwise
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, SearchIndexError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SearchIndexError::validation(format!("invalid endpoint: {}", e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(SearchIndexError::validation(format!(
                "endpoint '{}' must be an http(s) URL",
                endpoint
            )));
        }

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            names: SearchResourceNames::default(),
            datasource: DataSourceConfig::default(),
            request_timeout: Duration::from_secs(30),
            search_top: DEFAULT_SEARCH_TOP,
            suggest_top: DEFAULT_SUGGEST_TOP,
            indexer_interval: DEFAULT_INDEXER_INTERVAL.to_string(),
        })
    }

    pub fn with_names(mut self, names: SearchResourceNames) -> Self {
        self.names = names;
        self
    }

    pub fn with_datasource(mut self, datasource: DataSourceConfig) -> Self {
        self.datasource = datasource;
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Configuration for the SearchIndexService.
///
/// Controls batch limits and query validation. Use this to prevent accidentally
/// sending overly large batches to the search service.
#[derive(Debug, Clone)]
pub struct SearchIndexServiceConfig {
    /// Maximum number of documents allowed in a single batch operation.
    ///
    /// Set to `None` to disable the limit (not recommended for production).
    /// Defaults to 1000 if not specified.
    pub max_batch_size: Option<usize>,
    /// Maximum length of a suggest prefix, in characters.
    pub max_suggest_prefix: usize,
    /// Maximum length of a search query, in characters.
    pub max_query_length: usize,
}

impl Default for SearchIndexServiceConfig {
    fn default() -> Self {
        Self {
            max_batch_size: Some(1000),
            max_suggest_prefix: 100,
            max_query_length: 1000,
        }
    }
}

impl SearchIndexServiceConfig {
    /// Create a config with no batch size limit.
    ///
    /// # Warning
    ///
    /// Removing batch size limits can lead to request timeouts when very large
    /// batches are sent. Not recommended for production.
    pub fn unlimited() -> Self {
        Self {
            max_batch_size: None,
            ..Self::default()
        }
    }

    /// Create a config with a custom batch size limit.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: Some(max_batch_size),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchServiceConfig::new("https://search.example.net", "key").unwrap();
        assert_eq!(config.api_version, "2019-05-06");
        assert_eq!(config.search_top, 15);
        assert_eq!(config.suggest_top, 10);
        assert_eq!(config.indexer_interval, "PT5M");
        assert_eq!(config.names.index, "todo");
        assert_eq!(config.datasource.high_water_mark_column, "_ts");
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        assert!(SearchServiceConfig::new("ftp://search.example.net", "key").is_err());
        assert!(SearchServiceConfig::new("not a url", "key").is_err());
    }

    #[test]
    fn test_service_config_limits() {
        assert_eq!(SearchIndexServiceConfig::default().max_batch_size, Some(1000));
        assert_eq!(SearchIndexServiceConfig::unlimited().max_batch_size, None);
        assert_eq!(
            SearchIndexServiceConfig::with_max_batch_size(5).max_batch_size,
            Some(5)
        );
    }
}
