use super::types::{MaintenanceState, MaintenanceStats};
use super::worker::MaintenanceWorker;
use crate::core::{CacheError, Result};
use crate::storage::{LocationStore, SnapshotSink};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Periodically persists the location table.
///
/// A cycle takes a snapshot of the store and hands it to the sink. Cycles
/// are serialized through `cycle_lock`: a cycle that becomes due while
/// another is still in flight waits for it instead of running alongside.
/// The timer is re-armed only after a cycle completes, so a slow save delays
/// the next tick rather than stacking up behind it.
#[derive(Clone)]
pub struct MaintenanceScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    store: LocationStore,
    sink: Arc<dyn SnapshotSink>,
    interval: Duration,
    cycle_lock: Mutex<()>,
    state: watch::Sender<MaintenanceState>,
    stats: Mutex<MaintenanceStats>,
    worker_running: AtomicBool,
}

impl MaintenanceScheduler {
    pub fn new(
        store: LocationStore,
        sink: Arc<dyn SnapshotSink>,
        interval: Duration,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "maintenance interval must be greater than zero".to_string(),
            ));
        }

        let (state, _) = watch::channel(MaintenanceState::Idle);
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                store,
                sink,
                interval,
                cycle_lock: Mutex::new(()),
                state,
                stats: Mutex::new(MaintenanceStats::default()),
                worker_running: AtomicBool::new(false),
            }),
        })
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn state(&self) -> MaintenanceState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MaintenanceState> {
        self.inner.state.subscribe()
    }

    pub async fn stats(&self) -> MaintenanceStats {
        self.inner.stats.lock().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.worker_running.load(Ordering::SeqCst)
    }

    /// Start the self-rescheduling loop. Fails if a worker is already running.
    pub fn start(&self) -> Result<MaintenanceWorker> {
        self.mark_started()?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let scheduler = self.clone();
        let interval = self.inner.interval;
        self.set_state(MaintenanceState::Waiting);

        let join_handle = tokio::spawn(async move {
            loop {
                info!(
                    "Next cache maintenance in {:.2} minutes",
                    interval.as_secs_f64() / 60.0
                );
                tokio::select! {
                    _ = &mut stop_rx => {
                        break;
                    }
                    _ = sleep(interval) => {}
                }

                // Not raced against the stop signal: an in-flight save always finishes.
                if scheduler.run_cycle().await.is_err() {
                    debug!("rescheduling after failed maintenance cycle");
                }
            }
            debug!("maintenance loop exited");
        });

        Ok(MaintenanceWorker::new(self.clone(), stop_tx, join_handle))
    }

    /// Run one persistence cycle now, waiting for any cycle already in flight.
    ///
    /// The save error, if any, is recorded in the stats and returned.
    pub async fn run_cycle(&self) -> Result<()> {
        // The cycle owns the lock inside its own task, so aborting the caller
        // (a dropped worker) cannot release it while a save is still running.
        let scheduler = self.clone();
        match tokio::spawn(async move { scheduler.cycle().await }).await {
            Ok(result) => result,
            Err(join_err) => {
                let err = CacheError::from(join_err);
                warn!(error = %err, "Cache maintenance task failed");
                {
                    let mut stats = self.inner.stats.lock().await;
                    stats.failed_cycles += 1;
                    stats.last_error = Some(err.to_string());
                }
                self.set_state(self.resting_state());
                Err(err)
            }
        }
    }

    async fn cycle(&self) -> Result<()> {
        let _cycle = match self.inner.cycle_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Parallel maintenance cycle found; awaiting it");
                self.inner.cycle_lock.lock().await
            }
        };

        self.set_state(MaintenanceState::Running);
        info!("Cache maintenance starting");

        let snapshot = self.inner.store.snapshot_view().await;
        let entries = snapshot.len();
        let started = Instant::now();
        let result = self.inner.sink.save(&snapshot).await;

        {
            let mut stats = self.inner.stats.lock().await;
            match &result {
                Ok(()) => {
                    stats.completed_cycles += 1;
                    stats.last_success_at = Some(Utc::now());
                    info!(
                        entries,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Cache maintenance completed"
                    );
                }
                Err(err) => {
                    warn!(error = %err, entries, "Cache maintenance failed");
                    stats.failed_cycles += 1;
                    stats.last_error = Some(err.to_string());
                }
            }
        }

        self.set_state(self.resting_state());
        result
    }

    fn resting_state(&self) -> MaintenanceState {
        if self.is_running() {
            MaintenanceState::Waiting
        } else {
            MaintenanceState::Idle
        }
    }

    pub(super) fn mark_started(&self) -> Result<()> {
        if self.inner.worker_running.swap(true, Ordering::SeqCst) {
            return Err(CacheError::MaintenanceError(
                "maintenance worker already running".to_string(),
            ));
        }
        Ok(())
    }

    pub(super) fn mark_stopped(&self) {
        self.inner.worker_running.store(false, Ordering::SeqCst);
        self.set_state(MaintenanceState::Idle);
    }

    fn set_state(&self, state: MaintenanceState) {
        self.inner.state.send_replace(state);
    }
}
