// ============================================================================
// lastmsg Library
// ============================================================================

//! Tracks the last message each user sent in a live event stream.
//!
//! Locations (stream id + item id) are kept in memory, written to a JSON
//! sink on a fixed cadence, and reconciled against the live source when
//! looked up.
//!
//! ```no_run
//! use lastmsg::{FetchError, Item, Location, MessageSource, ResolvedMessage, Tracker, UserId};
//! use std::sync::Arc;
//!
//! struct Gateway;
//!
//! #[async_trait::async_trait]
//! impl MessageSource for Gateway {
//!     async fn fetch_item(&self, _location: &Location) -> Result<Item, FetchError> {
//!         Err(FetchError::NotFound)
//!     }
//! }
//!
//! # async fn run() -> lastmsg::Result<()> {
//! let tracker = Tracker::open("lastmsg.json", Arc::new(Gateway)).await?;
//! tracker.on_ready().await?;
//!
//! match tracker.resolve(&UserId::from(42u64)).await {
//!     ResolvedMessage::NoLocation => println!("never seen"),
//!     ResolvedMessage::LocationStale(location) => println!("deleted: {}", location),
//!     ResolvedMessage::LocationLive(message) => println!("{}", message.content),
//! }
//!
//! tracker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod maintenance;
pub mod resolve;
pub mod storage;
pub mod tracker;

pub use config::CacheConfig;
pub use crate::core::{
    Author, CacheError, FetchError, Item, LiveMessage, Location, ResolvedMessage, Result,
    Snapshot, UserId,
};
pub use maintenance::{MaintenanceScheduler, MaintenanceState, MaintenanceStats, MaintenanceWorker};
pub use resolve::{MessageSource, ResolutionService};
pub use storage::{FileSnapshotSink, LocationStore, SnapshotSink};
pub use tracker::Tracker;
