use crate::core::{Location, Snapshot, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory user → location table.
///
/// Cloning yields another handle to the same table. All operations are O(1)
/// under a single lock except `snapshot_view`/`restore`, which copy or swap the
/// whole map; nothing here performs I/O, so the lock is never held across an
/// await point.
#[derive(Debug, Clone, Default)]
pub struct LocationStore {
    locations: Arc<RwLock<HashMap<UserId, Location>>>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user: &UserId) -> Option<Location> {
        self.locations.read().await.get(user).copied()
    }

    pub async fn has(&self, user: &UserId) -> bool {
        self.locations.read().await.contains_key(user)
    }

    /// Record the latest location for a user, replacing any previous one.
    pub async fn set(&self, user: UserId, location: Location) {
        self.locations.write().await.insert(user, location);
    }

    /// Forget a user. Returns the evicted location, if there was one.
    pub async fn remove(&self, user: &UserId) -> Option<Location> {
        self.locations.write().await.remove(user)
    }

    pub async fn len(&self) -> usize {
        self.locations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locations.read().await.is_empty()
    }

    /// Consistent copy of the whole table.
    pub async fn snapshot_view(&self) -> Snapshot {
        Snapshot::new(self.locations.read().await.clone())
    }

    /// Replace the whole table with the snapshot's contents.
    pub async fn restore(&self, snapshot: Snapshot) {
        *self.locations.write().await = snapshot.locations;
    }
}
