//! Idempotent creation of the search index, data source and indexer.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::SearchServiceConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::rest::definitions::{datasource_definition, index_definition, indexer_definition};
use crate::types::ResourceKind;

/// Which definitions a provisioning run had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub index_created: bool,
    pub datasource_created: bool,
    pub indexer_created: bool,
}

impl ProvisioningReport {
    /// Whether anything was created.
    pub fn changed(&self) -> bool {
        self.index_created || self.datasource_created || self.indexer_created
    }
}

/// Ensures the search definitions exist before the application serves traffic.
///
/// Each definition is created only if absent, so running the provisioner on
/// every startup is safe.
pub struct SearchProvisioner {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchServiceConfig,
}

impl SearchProvisioner {
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: SearchServiceConfig) -> Self {
        Self { provider, config }
    }

    /// Ensure the index, data source and indexer exist, in that order.
    ///
    /// Used when the search service's own indexer keeps the index in sync.
    #[instrument(skip(self), fields(index = %self.config.names.index))]
    pub async fn setup_search(&self) -> Result<ProvisioningReport, SearchIndexError> {
        let report = ProvisioningReport {
            index_created: self.create_index_if_absent().await?,
            datasource_created: self.create_datasource_if_absent().await?,
            indexer_created: self.create_indexer_if_absent().await?,
        };
        info!(
            index_created = report.index_created,
            datasource_created = report.datasource_created,
            indexer_created = report.indexer_created,
            "Search provisioning complete"
        );
        Ok(report)
    }

    /// Ensure only the index exists.
    ///
    /// Used when the embedded sync coordinator writes documents directly.
    #[instrument(skip(self), fields(index = %self.config.names.index))]
    pub async fn setup_index_only(&self) -> Result<ProvisioningReport, SearchIndexError> {
        let report = ProvisioningReport {
            index_created: self.create_index_if_absent().await?,
            ..ProvisioningReport::default()
        };
        info!(index_created = report.index_created, "Search index ready");
        Ok(report)
    }

    pub async fn create_index_if_absent(&self) -> Result<bool, SearchIndexError> {
        self.create_if_absent(ResourceKind::Index, &self.config.names.index, index_definition(&self.config))
            .await
    }

    pub async fn create_datasource_if_absent(&self) -> Result<bool, SearchIndexError> {
        self.create_if_absent(
            ResourceKind::DataSource,
            &self.config.names.datasource,
            datasource_definition(&self.config),
        )
        .await
    }

    /// Create the indexer. The data source it reads from is ensured first.
    pub async fn create_indexer_if_absent(&self) -> Result<bool, SearchIndexError> {
        self.create_datasource_if_absent().await?;
        self.create_if_absent(
            ResourceKind::Indexer,
            &self.config.names.indexer,
            indexer_definition(&self.config),
        )
        .await
    }

    async fn create_if_absent(
        &self,
        kind: ResourceKind,
        name: &str,
        definition: Value,
    ) -> Result<bool, SearchIndexError> {
        if self.provider.resource_exists(kind, name).await? {
            debug!(kind = %kind, name, "Search resource already exists");
            return Ok(false);
        }

        self.provider.create_resource(kind, &definition).await?;
        info!(kind = %kind, name, "Search resource created");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySearchProvider;

    fn setup() -> (Arc<InMemorySearchProvider>, SearchProvisioner) {
        let provider = Arc::new(InMemorySearchProvider::default());
        let config = SearchServiceConfig::new("https://search.example.net", "key").unwrap();
        let provisioner = SearchProvisioner::new(provider.clone(), config);
        (provider, provisioner)
    }

    #[tokio::test]
    async fn test_setup_search_creates_everything_once() {
        let (provider, provisioner) = setup();

        let first = provisioner.setup_search().await.unwrap();
        assert!(first.index_created && first.datasource_created && first.indexer_created);
        assert_eq!(provider.create_calls(), 3);

        let second = provisioner.setup_search().await.unwrap();
        assert!(!second.changed());
        assert_eq!(provider.create_calls(), 3);
    }

    #[tokio::test]
    async fn test_setup_index_only() {
        let (provider, provisioner) = setup();

        let report = provisioner.setup_index_only().await.unwrap();

        assert!(report.index_created);
        assert!(!report.indexer_created);
        assert!(provider.has_resource(ResourceKind::Index, "todo"));
        assert!(!provider.has_resource(ResourceKind::Indexer, "todo-indexer"));
    }

    #[tokio::test]
    async fn test_indexer_brings_its_datasource() {
        let (provider, provisioner) = setup();

        assert!(provisioner.create_indexer_if_absent().await.unwrap());

        assert!(provider.has_resource(ResourceKind::DataSource, "todo-datasource"));
        assert!(provider.has_resource(ResourceKind::Indexer, "todo-indexer"));
    }
}
