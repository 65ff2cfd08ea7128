use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Maintenance error: {0}")]
    MaintenanceError(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Failure of a live-source lookup. All variants mean "unreachable".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("item not found")]
    NotFound,

    #[error("access to item forbidden")]
    Forbidden,

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::MaintenanceError(format!("task join: {}", err))
    }
}
