//! Dependency initialization and wiring for the to-do service.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::server::AppState;
use crate::AppError;
use todo_search_repository::{
    InMemorySearchProvider, ProvisioningReport, RestSearchProvider, SearchIndexProvider,
    SearchIndexService, SearchProvisioner,
};
use todo_store_repository::{
    InMemoryItemStore, InMemorySyncStateRepository, ItemStore, ItemStoreService,
    PostgresItemStore, PostgresSyncStateRepository, StoreConfig, SyncStateRepository,
};
use todo_sync::SyncCoordinator;

use super::settings::{AppConfig, ConnectionMode, SearchBackend, StoreBackend, SyncMode};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Shared state handed to the HTTP router.
    pub state: AppState,
}

impl Dependencies {
    /// Connect the store, provision the search resources and start the
    /// coordinator when the index is kept in sync in-process.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(AppError)` - If initialization fails. In retry mode transient
    ///   failures are retried instead of returned.
    pub async fn new(config: &AppConfig) -> Result<Self, AppError> {
        info!(
            store_backend = ?config.store_backend,
            database = %config.store.database,
            collection = %config.store.collection,
            search_backend = ?config.search_backend,
            search_endpoint = %config.search.endpoint,
            index = %config.search.names.index,
            sync_mode = ?config.sync_mode,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let (store, sync_state): (Arc<dyn ItemStore>, Arc<dyn SyncStateRepository>) =
            match config.store_backend {
                StoreBackend::Postgres => {
                    let url = config.database_url.as_deref().ok_or_else(|| {
                        AppError::config("DATABASE_URL is required for the postgres store")
                    })?;
                    let store = Self::connect_to_postgres(
                        url,
                        config.store.clone(),
                        config.connection_mode,
                        config.retry_interval,
                    )
                    .await?;
                    let sync_state = PostgresSyncStateRepository::new(store.pool().clone()).await?;
                    (Arc::new(store), Arc::new(sync_state))
                }
                StoreBackend::Memory => {
                    let store = InMemoryItemStore::new()
                        .with_partition_key_path(&config.store.partition_key_path)?
                        .with_operation_timeout(config.store.operation_timeout);
                    (Arc::new(store), Arc::new(InMemorySyncStateRepository::new()))
                }
            };

        info!("Item store connection established");

        // The collection must exist before anything reads or indexes it
        store.ensure_collection().await.map_err(|e| {
            AppError::provisioning(format!("Failed to provision item collection: {}", e))
        })?;

        let provider: Arc<dyn SearchIndexProvider> = match config.search_backend {
            SearchBackend::Rest => Arc::new(RestSearchProvider::new(config.search.clone())?),
            SearchBackend::Memory => {
                Arc::new(InMemorySearchProvider::new(config.search.names.clone()))
            }
        };

        let provisioner = Arc::new(SearchProvisioner::new(
            Arc::clone(&provider),
            config.search.clone(),
        ));

        let report = Self::provision_search(
            &provisioner,
            config.sync_mode,
            config.connection_mode,
            config.retry_interval,
        )
        .await?;

        info!(
            index_created = report.index_created,
            datasource_created = report.datasource_created,
            indexer_created = report.indexer_created,
            "Search resources ready"
        );

        let sync = match config.sync_mode {
            SyncMode::Embedded => {
                let coordinator = Arc::new(SyncCoordinator::new(
                    Arc::clone(&store),
                    Arc::clone(&provider),
                    sync_state,
                    config.coordinator.clone(),
                ));
                info!(
                    coordinator_id = %config.coordinator.id,
                    interval_secs = config.coordinator.interval.as_secs(),
                    "Starting sync coordinator"
                );
                Some(Arc::new(coordinator.spawn()))
            }
            SyncMode::Managed => None,
        };

        let state = AppState {
            items: Arc::new(ItemStoreService::new(store)),
            search: Arc::new(SearchIndexService::new(provider)),
            provisioner,
            sync,
            sync_mode: config.sync_mode,
        };

        Ok(Self { state })
    }

    /// Connect to PostgreSQL with retry logic based on connection mode.
    async fn connect_to_postgres(
        url: &str,
        store_config: StoreConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<PostgresItemStore, AppError> {
        loop {
            match PostgresItemStore::connect(url, store_config.clone()).await {
                Ok(store) => return Ok(store),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(AppError::config(format!(
                            "Failed to connect to PostgreSQL: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to PostgreSQL, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Provision the definitions the sync mode needs.
    ///
    /// Only transient search failures are retried; a rejected definition
    /// halts startup in either mode.
    async fn provision_search(
        provisioner: &SearchProvisioner,
        sync_mode: SyncMode,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<ProvisioningReport, AppError> {
        loop {
            let result = match sync_mode {
                SyncMode::Embedded => provisioner.setup_index_only().await,
                SyncMode::Managed => provisioner.setup_search().await,
            };

            match result {
                Ok(report) => return Ok(report),
                Err(e) if mode == ConnectionMode::Retry && e.is_transient() => {
                    warn!(
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Failed to provision search resources, retrying..."
                    );
                    sleep(retry_interval).await;
                }
                Err(e) => {
                    return Err(AppError::provisioning(format!(
                        "Failed to provision search resources: {}",
                        e
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "STORE_BACKEND" | "SEARCH_BACKEND" => Some("memory".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_embedded_mode_provisions_index_and_starts_coordinator() {
        let deps = Dependencies::new(&memory_config()).await.unwrap();

        assert!(deps.state.sync.is_some());
        assert_eq!(deps.state.sync_mode, SyncMode::Embedded);

        // Index exists, so a search answers with an empty result
        let results = deps.state.search.search("*").await.unwrap();
        assert_eq!(results.total_count, 0);

        if let Some(sync) = &deps.state.sync {
            sync.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_provisioning_follows_sync_mode() {
        let config = memory_config();
        let provider = Arc::new(InMemorySearchProvider::new(config.search.names.clone()));
        let provisioner = SearchProvisioner::new(provider.clone(), config.search.clone());

        let report = Dependencies::provision_search(
            &provisioner,
            SyncMode::Embedded,
            ConnectionMode::FailFast,
            Duration::from_millis(1),
        )
        .await
        .unwrap();
        assert!(report.index_created);
        assert!(!report.datasource_created);
        assert!(!report.indexer_created);

        let report = Dependencies::provision_search(
            &provisioner,
            SyncMode::Managed,
            ConnectionMode::FailFast,
            Duration::from_millis(1),
        )
        .await
        .unwrap();
        assert!(!report.index_created);
        assert!(report.datasource_created);
        assert!(report.indexer_created);
    }
}
