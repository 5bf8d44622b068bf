//! Coordinator module for the sync pipeline.
//!
//! Coordinates the scanner, processor and loader, persists the watermark and
//! ledger after each successful cycle, and schedules cycles on an interval or
//! on demand.

mod handle;

pub use handle::SyncHandle;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use todo_search_repository::{SearchIndexProvider, SearchIndexService};
use todo_store_repository::{ItemStore, SyncLease, SyncStateRepository};

use crate::errors::SyncError;
use crate::loader::{LoaderConfig, SearchLoader};
use crate::processor::DiffProcessor;
use crate::scanner::ChangeScanner;

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Key under which the watermark and ledger are persisted.
    pub id: String,
    /// Time between scheduled cycles.
    pub interval: Duration,
    /// How far before the watermark each scan starts.
    pub scan_overlap: Duration,
    /// Deadline for a whole cycle.
    pub cycle_timeout: Duration,
    /// Size of the on-demand request buffer.
    pub command_buffer: usize,
    pub batch_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            id: "embedded".to_string(),
            interval: Duration::from_secs(300),
            scan_overlap: Duration::from_millis(5000),
            cycle_timeout: Duration::from_secs(120),
            command_buffer: 16,
            batch_size: LoaderConfig::default().batch_size,
        }
    }
}

/// Stage of the cycle currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Scanning,
    Diffing,
    Applying,
}

/// What a successful cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub scanned: usize,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Watermark committed at the end of the cycle.
    pub watermark: i64,
}

impl CycleReport {
    pub fn upserted(&self) -> usize {
        self.new + self.changed
    }
}

/// Counters accumulated since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub cycles_skipped: u64,
    pub documents_upserted: u64,
    pub documents_deleted: u64,
}

#[derive(Default)]
struct Counters {
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    cycles_skipped: AtomicU64,
    documents_upserted: AtomicU64,
    documents_deleted: AtomicU64,
}

pub(crate) enum SyncCommand {
    RunNow(oneshot::Sender<Result<CycleReport, SyncError>>),
}

/// Keeps the search index in step with the item store.
///
/// Cycles never overlap: they are serialized by a lock, and the watermark is
/// read, advanced and committed inside it. Each cycle also holds the state
/// repository's lease for the coordinator id, which keeps other processes
/// sharing that id out.
pub struct SyncCoordinator {
    scanner: ChangeScanner,
    processor: DiffProcessor,
    loader: SearchLoader,
    state: Arc<dyn SyncStateRepository>,
    config: CoordinatorConfig,
    cycle_lock: Mutex<()>,
    phase_tx: watch::Sender<SyncPhase>,
    counters: Counters,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn ItemStore>,
        provider: Arc<dyn SearchIndexProvider>,
        state: Arc<dyn SyncStateRepository>,
        config: CoordinatorConfig,
    ) -> Self {
        let (phase_tx, _) = watch::channel(SyncPhase::Idle);
        Self {
            scanner: ChangeScanner::new(store, config.scan_overlap),
            processor: DiffProcessor::new(),
            loader: SearchLoader::with_config(
                Arc::new(SearchIndexService::new(provider)),
                LoaderConfig {
                    batch_size: config.batch_size,
                },
            ),
            state,
            config,
            cycle_lock: Mutex::new(()),
            phase_tx,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase_tx.borrow()
    }

    /// Watch the phase of the running cycle.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase_tx.subscribe()
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            cycles_completed: self.counters.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.counters.cycles_failed.load(Ordering::Relaxed),
            cycles_skipped: self.counters.cycles_skipped.load(Ordering::Relaxed),
            documents_upserted: self.counters.documents_upserted.load(Ordering::Relaxed),
            documents_deleted: self.counters.documents_deleted.load(Ordering::Relaxed),
        }
    }

    /// Run a cycle, waiting for any cycle in progress to finish first.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let _guard = self.cycle_lock.lock().await;
        self.run_locked().await
    }

    /// Run a cycle unless one is already in progress.
    ///
    /// Returns `None` when the cycle was skipped.
    pub async fn try_run_cycle(&self) -> Option<Result<CycleReport, SyncError>> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            self.counters.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Sync cycle already in progress, skipping tick");
            return None;
        };
        Some(self.run_locked().await)
    }

    /// Forget the watermark and ledger so the next cycle reindexes everything.
    pub async fn reset_state(&self) -> Result<(), SyncError> {
        let _guard = self.cycle_lock.lock().await;
        let lease = self.acquire_lease().await?;
        let result = self.state.clear(&self.config.id).await;
        self.release_lease(lease).await;
        result?;
        info!(coordinator = %self.config.id, "Sync state cleared");
        Ok(())
    }

    async fn acquire_lease(&self) -> Result<Box<dyn SyncLease>, SyncError> {
        self.state
            .try_acquire(&self.config.id)
            .await?
            .ok_or_else(|| SyncError::LeaseHeld(self.config.id.clone()))
    }

    async fn release_lease(&self, lease: Box<dyn SyncLease>) {
        if let Err(e) = lease.release().await {
            warn!(coordinator = %self.config.id, error = %e, "Failed to release sync lease");
        }
    }

    async fn run_locked(&self) -> Result<CycleReport, SyncError> {
        let result = match tokio::time::timeout(self.config.cycle_timeout, self.cycle()).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.config.cycle_timeout)),
        };
        self.phase_tx.send_replace(SyncPhase::Idle);

        match &result {
            Ok(report) => {
                self.counters.cycles_completed.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .documents_upserted
                    .fetch_add(report.upserted() as u64, Ordering::Relaxed);
                self.counters
                    .documents_deleted
                    .fetch_add(report.deleted as u64, Ordering::Relaxed);
                let stats = self.stats();
                info!(
                    scanned = report.scanned,
                    upserted = report.upserted(),
                    deleted = report.deleted,
                    watermark = report.watermark,
                    cycles_completed = stats.cycles_completed,
                    documents_upserted = stats.documents_upserted,
                    documents_deleted = stats.documents_deleted,
                    "Sync cycle complete"
                );
            }
            Err(SyncError::LeaseHeld(id)) => {
                self.counters.cycles_skipped.fetch_add(1, Ordering::Relaxed);
                info!(coordinator = %id, "Sync state leased by another process, skipping cycle");
            }
            Err(e) => {
                self.counters.cycles_failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Sync cycle failed, watermark not advanced");
            }
        }
        result
    }

    #[instrument(skip(self), fields(coordinator = %self.config.id))]
    async fn cycle(&self) -> Result<CycleReport, SyncError> {
        let lease = self.acquire_lease().await?;
        let result = self.leased_cycle().await;
        self.release_lease(lease).await;
        result
    }

    async fn leased_cycle(&self) -> Result<CycleReport, SyncError> {
        let state = self.state.load(&self.config.id).await?;

        self.phase_tx.send_replace(SyncPhase::Scanning);
        let scan = self.scanner.scan(state.watermark).await?;

        self.phase_tx.send_replace(SyncPhase::Diffing);
        let plan = self.processor.diff(&scan, &state.ledger)?;

        let watermark = scan
            .max_ts
            .map_or(state.watermark, |ts| ts.max(state.watermark));
        let report = CycleReport {
            scanned: scan.documents.len(),
            new: plan.new,
            changed: plan.changed,
            unchanged: plan.unchanged,
            deleted: plan.deletes.len(),
            watermark,
        };

        if !plan.is_empty() {
            self.phase_tx.send_replace(SyncPhase::Applying);
            self.loader.apply(&plan).await?;
        }

        let commit = plan.into_commit(watermark);
        if !commit.is_empty() || watermark != state.watermark {
            self.state.commit_cycle(&self.config.id, &commit).await?;
        }
        Ok(report)
    }

    /// Start the scheduling loop in the background.
    ///
    /// The first cycle runs immediately, then every `interval`. Ticks missed
    /// while a cycle runs are skipped.
    pub fn spawn(self: Arc<Self>) -> SyncHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let phase = self.subscribe();
        let coordinator = Arc::clone(&self);
        let task = tokio::spawn(async move {
            coordinator.run_loop(command_rx, shutdown_rx).await;
        });
        SyncHandle::new(self, command_tx, shutdown_tx, phase, task)
    }

    async fn run_loop(
        &self,
        mut commands: mpsc::Receiver<SyncCommand>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(
            coordinator = %self.config.id,
            interval_secs = self.config.interval.as_secs(),
            "Starting sync coordinator"
        );
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.try_run_cycle().await;
                }
                Some(command) = commands.recv() => {
                    match command {
                        SyncCommand::RunNow(reply) => {
                            let result = self.run_cycle().await;
                            let _ = reply.send(result);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        let stats = self.stats();
        info!(
            cycles_completed = stats.cycles_completed,
            cycles_failed = stats.cycles_failed,
            cycles_skipped = stats.cycles_skipped,
            documents_upserted = stats.documents_upserted,
            documents_deleted = stats.documents_deleted,
            "Sync coordinator shutdown complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use todo_search_repository::{InMemorySearchProvider, ResourceKind};
    use todo_shared::Item;
    use todo_store_repository::{InMemoryItemStore, InMemorySyncStateRepository};

    struct Fixture {
        store: Arc<InMemoryItemStore>,
        search: Arc<InMemorySearchProvider>,
        state: Arc<InMemorySyncStateRepository>,
        coordinator: SyncCoordinator,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryItemStore::new());
        let search = Arc::new(InMemorySearchProvider::default());
        search
            .create_resource(ResourceKind::Index, &json!({"name": "todo"}))
            .await
            .unwrap();
        let state = Arc::new(InMemorySyncStateRepository::new());
        let coordinator = SyncCoordinator::new(
            store.clone(),
            search.clone(),
            state.clone(),
            CoordinatorConfig::default(),
        );
        Fixture {
            store,
            search,
            state,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_cycle_indexes_every_item() {
        let f = fixture().await;
        for title in ["Buy milk", "Walk dog", "Pay rent"] {
            f.store.create(&Item::new(title)).await.unwrap();
        }

        let report = f.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.new, 3);
        assert_eq!(f.search.document_count(), 3);
        assert_eq!(f.coordinator.phase(), SyncPhase::Idle);
        let state = f.state.load("embedded").await.unwrap();
        assert_eq!(state.watermark, report.watermark);
        assert_eq!(state.ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_second_cycle_skips_unchanged_rereads() {
        let f = fixture().await;
        f.store.create(&Item::new("Buy milk")).await.unwrap();
        f.coordinator.run_cycle().await.unwrap();

        let report = f.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.scanned, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.upserted(), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete_propagate() {
        let f = fixture().await;
        let milk = f.store.create(&Item::new("Buy milk")).await.unwrap();
        let dog = f.store.create(&Item::new("Walk dog")).await.unwrap();
        f.coordinator.run_cycle().await.unwrap();

        let mut done = milk.clone();
        done.complete();
        f.store.update(&milk.id, &done).await.unwrap();
        f.store.delete(&dog.id, &dog.id).await.unwrap();
        let report = f.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.deleted, 1);
        assert!(f.search.document(&milk.id).unwrap().is_complete);
        assert!(f.search.document(&dog.id).is_none());
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_watermark_and_retry_converges() {
        let f = fixture().await;
        let good = f.store.create(&Item::new("Buy milk")).await.unwrap();
        let bad = f.store.create(&Item::new("Walk dog")).await.unwrap();
        f.search.fail_document(&bad.id);

        let result = f.coordinator.run_cycle().await;

        assert!(matches!(result, Err(SyncError::PartialFailure { .. })));
        let state = f.state.load("embedded").await.unwrap();
        assert_eq!(state.watermark, 0);
        assert!(state.ledger.is_empty());
        assert!(f.search.document(&good.id).is_some());

        f.search.clear_failures();
        let report = f.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.new, 2);
        assert_eq!(f.search.document_count(), 2);
        assert_eq!(f.coordinator.stats().cycles_failed, 1);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_commit() {
        let f = fixture().await;
        f.store.create(&Item::new("Buy milk")).await.unwrap();
        f.store.set_unavailable(true);

        let result = f.coordinator.run_cycle().await;

        assert!(matches!(result, Err(SyncError::StoreError(_))));
        assert_eq!(f.state.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let f = fixture().await;
        f.store.create(&Item::new("Buy milk")).await.unwrap();
        f.state.set_fail_commits(true);

        let result = f.coordinator.run_cycle().await;

        assert!(matches!(result, Err(SyncError::StateError(_))));
    }

    #[tokio::test]
    async fn test_busy_tick_is_skipped() {
        let f = fixture().await;
        let guard = f.coordinator.cycle_lock.lock().await;

        assert!(f.coordinator.try_run_cycle().await.is_none());
        assert_eq!(f.coordinator.stats().cycles_skipped, 1);

        drop(guard);
        assert!(f.coordinator.try_run_cycle().await.is_some());
    }

    #[tokio::test]
    async fn test_reset_state_forces_full_reindex() {
        let f = fixture().await;
        f.store.create(&Item::new("Buy milk")).await.unwrap();
        f.coordinator.run_cycle().await.unwrap();

        f.coordinator.reset_state().await.unwrap();
        let report = f.coordinator.run_cycle().await.unwrap();

        assert_eq!(report.new, 1);
    }

    #[tokio::test]
    async fn test_cycle_yields_to_another_lease_holder() {
        let f = fixture().await;
        f.store.create(&Item::new("Buy milk")).await.unwrap();
        let other = f.state.try_acquire("embedded").await.unwrap().unwrap();

        let result = f.coordinator.run_cycle().await;

        assert!(matches!(result, Err(SyncError::LeaseHeld(_))));
        assert!(matches!(
            f.coordinator.reset_state().await,
            Err(SyncError::LeaseHeld(_))
        ));
        let stats = f.coordinator.stats();
        assert_eq!(stats.cycles_skipped, 1);
        assert_eq!(stats.cycles_failed, 0);
        assert_eq!(f.search.document_count(), 0);

        drop(other);
        let report = f.coordinator.run_cycle().await.unwrap();
        assert_eq!(report.new, 1);
        assert!(f.state.try_acquire("embedded").await.unwrap().is_some());
    }
}
