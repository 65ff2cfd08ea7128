//! Wiring between the event stream and the cache components.
//!
//! The event-stream client calls `on_ready`, `on_event` and `on_user_left`
//! as things happen; the command layer calls `resolve`.

use crate::config::CacheConfig;
use crate::core::{CacheError, Item, ResolvedMessage, Result, Snapshot, UserId};
use crate::maintenance::{MaintenanceScheduler, MaintenanceStats, MaintenanceWorker};
use crate::resolve::{MessageSource, ResolutionService};
use crate::storage::{FileSnapshotSink, LocationStore, SnapshotSink, read_document};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct Tracker {
    config: CacheConfig,
    store: LocationStore,
    sink: Arc<dyn SnapshotSink>,
    scheduler: MaintenanceScheduler,
    resolver: ResolutionService,
    worker: Mutex<Option<MaintenanceWorker>>,
}

impl Tracker {
    /// Open the sink file at `path`, reading its configuration namespace.
    ///
    /// A missing file means defaults; it is created by `on_ready`. A malformed
    /// file or invalid configuration fails here.
    pub async fn open<P: AsRef<Path>>(path: P, source: Arc<dyn MessageSource>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");
        let config = match read_document(path).await? {
            Some(document) => document.config,
            None => {
                info!("No sink file found; using default configuration");
                CacheConfig::default()
            }
        };
        let sink = Arc::new(FileSnapshotSink::new(path, config.clone()));
        Self::with_sink(config, sink, source)
    }

    pub fn with_sink(
        config: CacheConfig,
        sink: Arc<dyn SnapshotSink>,
        source: Arc<dyn MessageSource>,
    ) -> Result<Self> {
        config.validate()?;
        let store = LocationStore::new();
        let scheduler =
            MaintenanceScheduler::new(store.clone(), sink.clone(), config.maintain_interval())?;
        let resolver = ResolutionService::new(store.clone(), source);

        Ok(Self {
            config,
            store,
            sink,
            scheduler,
            resolver,
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &LocationStore {
        &self.store
    }

    pub fn scheduler(&self) -> &MaintenanceScheduler {
        &self.scheduler
    }

    pub async fn maintenance_stats(&self) -> MaintenanceStats {
        self.scheduler.stats().await
    }

    /// Load the persisted table (bootstrapping an empty one on first run)
    /// and start periodic maintenance.
    ///
    /// Connections fire this again after a reconnect; later calls are no-ops
    /// so the live table is never overwritten by an older snapshot.
    pub async fn on_ready(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            debug!("ready signal repeated; maintenance already running");
            return Ok(());
        }

        info!("Loading the user message cache");
        match self.sink.load().await? {
            Some(snapshot) => {
                let entries = snapshot.len();
                self.store.restore(snapshot).await;
                info!(entries, "Successfully loaded the user message cache");
            }
            None => {
                info!("No cache found; creating a new one");
                self.sink.save(&Snapshot::default()).await?;
            }
        }

        *worker = Some(self.scheduler.start()?);
        info!("Tracker is ready");
        Ok(())
    }

    /// Record an item as its author's latest message. Items from automated
    /// authors are ignored. Returns whether the item was recorded.
    pub async fn on_event(&self, item: &Item) -> bool {
        if item.author.automated {
            return false;
        }
        self.store.set(item.author.id.clone(), item.location()).await;
        true
    }

    pub async fn on_user_left(&self, user: &UserId) {
        if self.store.remove(user).await.is_some() {
            info!(user = %user, "Removing user from cache");
        }
    }

    pub async fn resolve(&self, user: &UserId) -> ResolvedMessage {
        self.resolver.resolve(user).await
    }

    /// Stop maintenance, letting an in-flight save finish, and flush once more.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(worker) = self.worker.lock().await.take() else {
            return Err(CacheError::MaintenanceError(
                "tracker was never started".to_string(),
            ));
        };
        info!("Shutting down cache maintenance");
        worker.stop().await
    }
}
