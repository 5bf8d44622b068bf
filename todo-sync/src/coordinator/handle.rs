use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{CycleReport, SyncCommand, SyncCoordinator, SyncPhase};
use crate::errors::SyncError;

/// Handle to a running coordinator loop.
///
/// Cheap to share behind an `Arc`; request handlers use it to trigger cycles
/// on demand.
pub struct SyncHandle {
    coordinator: Arc<SyncCoordinator>,
    commands: mpsc::Sender<SyncCommand>,
    shutdown_tx: broadcast::Sender<()>,
    phase: watch::Receiver<SyncPhase>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncHandle {
    pub(super) fn new(
        coordinator: Arc<SyncCoordinator>,
        commands: mpsc::Sender<SyncCommand>,
        shutdown_tx: broadcast::Sender<()>,
        phase: watch::Receiver<SyncPhase>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            coordinator,
            commands,
            shutdown_tx,
            phase,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Phase of the cycle currently running, `Idle` between cycles.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.clone()
    }

    /// Run a cycle as soon as any cycle in progress finishes, and wait for it.
    pub async fn run_now(&self) -> Result<CycleReport, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SyncCommand::RunNow(reply_tx))
            .await
            .map_err(|_| SyncError::channel("sync coordinator is not running"))?;
        reply_rx
            .await
            .map_err(|_| SyncError::channel("sync coordinator stopped before replying"))?
    }

    /// Stop the loop and wait for it to exit. A cycle in progress completes first.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sync coordinator task ended abnormally");
            }
        }
        info!("Sync coordinator stopped");
    }
}
