use crate::core::{FetchError, Item, Location};
use async_trait::async_trait;

/// Access to the live source of truth, provided by the event-stream client.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Item already held in a local event cache, if any. No I/O.
    async fn cached_item(&self, _location: &Location) -> Option<Item> {
        None
    }

    /// Fetch the item from the live source.
    async fn fetch_item(&self, location: &Location) -> Result<Item, FetchError>;
}
