//! Error types for veil-swarm

use thiserror::Error;
use veil_core::EngineError;
use veil_storage::StorageError;

/// Errors raised inside the directory swarm
#[derive(Debug, Error)]
pub enum SwarmError {
    /// Seed manifest could not be read or written
    #[error("Seed manifest error: {0}")]
    Manifest(String),

    /// Local content storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<postcard::Error> for SwarmError {
    fn from(err: postcard::Error) -> Self {
        SwarmError::Manifest(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SwarmError {
    fn from(err: tokio::task::JoinError) -> Self {
        SwarmError::Task(err.to_string())
    }
}

impl From<SwarmError> for EngineError {
    fn from(err: SwarmError) -> Self {
        match err {
            SwarmError::Storage(StorageError::Io(msg)) => EngineError::Io(msg),
            other => EngineError::Failed(other.to_string()),
        }
    }
}

/// Result type for swarm internals
pub type SwarmResult<T> = Result<T, SwarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_io_maps_to_engine_io() {
        let err: EngineError = SwarmError::Storage(StorageError::Io("disk full".into())).into();
        assert!(matches!(err, EngineError::Io(msg) if msg == "disk full"));
    }

    #[test]
    fn test_other_errors_map_to_failed() {
        let err: EngineError = SwarmError::Manifest("bad".into()).into();
        assert!(matches!(err, EngineError::Failed(_)));
    }
}
