use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::SyncStateError;
use crate::interfaces::{SyncCommit, SyncLease, SyncState, SyncStateRepository};

type HeldLeases = Arc<StdMutex<HashSet<String>>>;

/// Lease over one coordinator id; dropping it releases the id.
struct MemoryLease {
    id: String,
    held: HeldLeases,
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
    }
}

#[async_trait]
impl SyncLease for MemoryLease {
    async fn release(self: Box<Self>) -> Result<(), SyncStateError> {
        Ok(())
    }
}

/// Sync state kept in process memory. State is lost on restart.
#[derive(Default)]
pub struct InMemorySyncStateRepository {
    states: Mutex<HashMap<String, SyncState>>,
    held: HeldLeases,
    commit_count: AtomicUsize,
    fail_commits: AtomicBool,
}

impl InMemorySyncStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// While set, `commit_cycle` fails without changing the stored state.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SyncStateRepository for InMemorySyncStateRepository {
    async fn try_acquire(
        &self,
        coordinator_id: &str,
    ) -> Result<Option<Box<dyn SyncLease>>, SyncStateError> {
        let mut held = self
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !held.insert(coordinator_id.to_string()) {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryLease {
            id: coordinator_id.to_string(),
            held: Arc::clone(&self.held),
        })))
    }

    async fn load(&self, coordinator_id: &str) -> Result<SyncState, SyncStateError> {
        Ok(self
            .states
            .lock()
            .await
            .get(coordinator_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit_cycle(
        &self,
        coordinator_id: &str,
        commit: &SyncCommit,
    ) -> Result<(), SyncStateError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(SyncStateError::Unavailable(
                "in-memory sync state rejects commits".to_string(),
            ));
        }

        let mut states = self.states.lock().await;
        let state = states.entry(coordinator_id.to_string()).or_default();
        state.watermark = state.watermark.max(commit.watermark);
        for (id, hash) in &commit.upserted {
            state.ledger.insert(id.clone(), hash.clone());
        }
        for id in &commit.removed {
            state.ledger.remove(id);
        }
        self.commit_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, coordinator_id: &str) -> Result<(), SyncStateError> {
        self.states.lock().await.remove(coordinator_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_coordinator_starts_empty() {
        let repository = InMemorySyncStateRepository::new();
        let state = repository.load("sync").await.unwrap();
        assert_eq!(state, SyncState::default());
    }

    #[tokio::test]
    async fn test_commit_applies_ledger_delta() {
        let repository = InMemorySyncStateRepository::new();
        repository
            .commit_cycle(
                "sync",
                &SyncCommit {
                    watermark: 10,
                    upserted: vec![("a".into(), "h1".into()), ("b".into(), "h2".into())],
                    removed: vec![],
                },
            )
            .await
            .unwrap();
        repository
            .commit_cycle(
                "sync",
                &SyncCommit {
                    watermark: 20,
                    upserted: vec![("a".into(), "h3".into())],
                    removed: vec!["b".into()],
                },
            )
            .await
            .unwrap();

        let state = repository.load("sync").await.unwrap();
        assert_eq!(state.watermark, 20);
        assert_eq!(state.ledger.len(), 1);
        assert_eq!(state.ledger["a"], "h3");
    }

    #[tokio::test]
    async fn test_commit_never_lowers_watermark() {
        let repository = InMemorySyncStateRepository::new();
        for watermark in [200, 150] {
            repository
                .commit_cycle(
                    "sync",
                    &SyncCommit {
                        watermark,
                        upserted: vec![(format!("item-{watermark}"), "h".into())],
                        removed: vec![],
                    },
                )
                .await
                .unwrap();
        }

        let state = repository.load("sync").await.unwrap();
        assert_eq!(state.watermark, 200);
        assert_eq!(state.ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_until_released_or_dropped() {
        let repository = InMemorySyncStateRepository::new();

        let lease = repository.try_acquire("sync").await.unwrap().unwrap();
        assert!(repository.try_acquire("sync").await.unwrap().is_none());
        assert!(repository.try_acquire("other").await.unwrap().is_some());

        lease.release().await.unwrap();
        let again = repository.try_acquire("sync").await.unwrap();
        assert!(again.is_some());

        drop(again);
        assert!(repository.try_acquire("sync").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_state() {
        let repository = InMemorySyncStateRepository::new();
        repository
            .commit_cycle(
                "sync",
                &SyncCommit {
                    watermark: 5,
                    ..SyncCommit::default()
                },
            )
            .await
            .unwrap();

        repository.set_fail_commits(true);
        let result = repository
            .commit_cycle(
                "sync",
                &SyncCommit {
                    watermark: 9,
                    ..SyncCommit::default()
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(repository.load("sync").await.unwrap().watermark, 5);
        assert_eq!(repository.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_forgets_state() {
        let repository = InMemorySyncStateRepository::new();
        repository
            .commit_cycle(
                "sync",
                &SyncCommit {
                    watermark: 5,
                    upserted: vec![("a".into(), "h".into())],
                    removed: vec![],
                },
            )
            .await
            .unwrap();

        repository.clear("sync").await.unwrap();

        assert_eq!(repository.load("sync").await.unwrap(), SyncState::default());
    }
}
