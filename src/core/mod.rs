pub mod error;
pub mod types;

pub use error::{CacheError, FetchError, Result};
pub use types::{Author, Item, LiveMessage, Location, ResolvedMessage, Snapshot, UserId};
