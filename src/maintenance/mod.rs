//! Periodic persistence of the location table.

pub mod scheduler;
pub mod types;
pub mod worker;

pub use scheduler::MaintenanceScheduler;
pub use types::{MaintenanceState, MaintenanceStats};
pub use worker::MaintenanceWorker;
