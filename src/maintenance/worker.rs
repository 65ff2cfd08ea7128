use super::scheduler::MaintenanceScheduler;
use crate::core::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to a running maintenance loop.
pub struct MaintenanceWorker {
    scheduler: MaintenanceScheduler,
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl MaintenanceWorker {
    pub(super) fn new(
        scheduler: MaintenanceScheduler,
        stop_tx: oneshot::Sender<()>,
        join_handle: JoinHandle<()>,
    ) -> Self {
        Self {
            scheduler,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    pub fn scheduler(&self) -> &MaintenanceScheduler {
        &self.scheduler
    }

    /// Signals the loop to stop, waits for any in-flight cycle, then flushes
    /// the table one last time.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        let joined = match self.join_handle.take() {
            Some(join_handle) => join_handle.await,
            None => Ok(()),
        };
        self.scheduler.mark_stopped();
        joined?;

        info!("Flushing the user message cache before shutdown");
        self.scheduler.run_cycle().await
    }
}

/// Dropping without [`MaintenanceWorker::stop`] aborts the loop and skips the
/// final flush. A save already in flight still runs to completion and keeps
/// the cycle lock until it does, so a worker started right after waits for it.
impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
            self.scheduler.mark_stopped();
        }
    }
}
