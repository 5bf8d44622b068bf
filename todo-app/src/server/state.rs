// App state for the Axum server
use std::sync::Arc;

use todo_search_repository::{ProvisioningReport, SearchIndexError, SearchIndexService, SearchProvisioner};
use todo_store_repository::ItemStoreService;
use todo_sync::SyncHandle;

use crate::config::SyncMode;

#[derive(Clone)]
pub struct AppState {
    pub items: Arc<ItemStoreService>,
    pub search: Arc<SearchIndexService>,
    pub provisioner: Arc<SearchProvisioner>,
    /// Present when the embedded coordinator keeps the index in sync.
    pub sync: Option<Arc<SyncHandle>>,
    pub sync_mode: SyncMode,
}

impl AppState {
    /// Ensure the search definitions this sync mode needs.
    pub async fn provision_search(&self) -> Result<ProvisioningReport, SearchIndexError> {
        match self.sync_mode {
            SyncMode::Embedded => self.provisioner.setup_index_only().await,
            SyncMode::Managed => self.provisioner.setup_search().await,
        }
    }
}
