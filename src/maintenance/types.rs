use chrono::{DateTime, Utc};
use std::fmt;

/// Lifecycle of the maintenance loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaintenanceState {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Timer armed for the next cycle.
    Waiting,
    /// A persistence cycle is in flight.
    Running,
}

impl fmt::Display for MaintenanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceStats {
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl MaintenanceStats {
    pub fn total_cycles(&self) -> u64 {
        self.completed_cycles + self.failed_cycles
    }
}
