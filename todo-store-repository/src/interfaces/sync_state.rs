use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::SyncStateError;

/// Durable state of one sync coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Highest store modification timestamp covered by the last successful cycle.
    pub watermark: i64,
    /// Item id -> content hash of the projection currently in the search index.
    pub ledger: HashMap<String, String>,
}

/// Outcome of a fully successful sync cycle, committed atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCommit {
    pub watermark: i64,
    /// `(item id, content hash)` pairs written to the index during the cycle.
    pub upserted: Vec<(String, String)>,
    /// Item ids removed from the index during the cycle.
    pub removed: Vec<String>,
}

impl SyncCommit {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.removed.is_empty()
    }
}

/// Exclusive claim on one coordinator's state, held for the length of a cycle.
///
/// Dropping a lease without releasing it still gives the claim up, once the
/// backend notices.
#[async_trait]
pub trait SyncLease: Send {
    async fn release(self: Box<Self>) -> Result<(), SyncStateError>;
}

/// Trait for persisting the coordinator's watermark and ledger.
///
/// This trait provides an abstraction over the underlying data store so that the
/// coordinator can resume from its last successful cycle after a restart.
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Claim the coordinator's state so that only one process runs its cycles.
    ///
    /// Returns `None` while another holder has it.
    async fn try_acquire(
        &self,
        coordinator_id: &str,
    ) -> Result<Option<Box<dyn SyncLease>>, SyncStateError>;

    /// Load the state for a coordinator. Unknown coordinators start from an empty state.
    async fn load(&self, coordinator_id: &str) -> Result<SyncState, SyncStateError>;

    /// Atomically advance the watermark and apply the ledger delta.
    ///
    /// The stored watermark never moves backwards.
    async fn commit_cycle(
        &self,
        coordinator_id: &str,
        commit: &SyncCommit,
    ) -> Result<(), SyncStateError>;

    /// Forget all state for a coordinator, forcing the next cycle to rescan everything.
    async fn clear(&self, coordinator_id: &str) -> Result<(), SyncStateError>;
}
