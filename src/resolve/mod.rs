//! Lookup of a user's last message against the live source.

pub mod source;

pub use source::MessageSource;

use crate::core::{LiveMessage, ResolvedMessage, UserId};
use crate::storage::LocationStore;
use std::sync::Arc;
use tracing::debug;

/// Reconciles recorded locations with what the live source still holds.
#[derive(Clone)]
pub struct ResolutionService {
    store: LocationStore,
    source: Arc<dyn MessageSource>,
}

impl ResolutionService {
    pub fn new(store: LocationStore, source: Arc<dyn MessageSource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &LocationStore {
        &self.store
    }

    /// Resolve a user's last message. Never fails: every lookup failure of
    /// the live source is reported as `LocationStale`.
    pub async fn resolve(&self, user: &UserId) -> ResolvedMessage {
        let Some(location) = self.store.get(user).await else {
            return ResolvedMessage::NoLocation;
        };

        if let Some(item) = self.source.cached_item(&location).await {
            return ResolvedMessage::LocationLive(LiveMessage::from(item));
        }

        match self.source.fetch_item(&location).await {
            Ok(item) => {
                if item.author.id != *user {
                    debug!(
                        user = %user,
                        author = %item.author.id,
                        %location,
                        "stored user differs from live author; using live author"
                    );
                }
                ResolvedMessage::LocationLive(LiveMessage::from(item))
            }
            Err(err) => {
                debug!(user = %user, %location, error = %err, "recorded message unreachable");
                ResolvedMessage::LocationStale(location)
            }
        }
    }
}
