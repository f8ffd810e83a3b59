//! Error types for the session orchestrator

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use veil_core::{CodecError, EngineError};
use veil_crypto::CryptoError;
use veil_storage::StorageError;

use crate::state::Stage;

/// Coarse classification of a failure, stable across error sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    InvalidKey,
    Authentication,
    MalformedArtifact,
    Decode,
    Engine,
    NotFound,
    GrantConflict,
    Cancelled,
    TimedOut,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Io => "io",
            ErrorKind::InvalidKey => "invalid-key",
            ErrorKind::Authentication => "authentication",
            ErrorKind::MalformedArtifact => "malformed-artifact",
            ErrorKind::Decode => "decode",
            ErrorKind::Engine => "engine",
            ErrorKind::NotFound => "not-found",
            ErrorKind::GrantConflict => "grant-conflict",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::TimedOut => "timed-out",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the orchestrator
#[derive(Debug, Error)]
pub enum NodeError {
    /// File system error outside the storage layer
    #[error("I/O error: {0}")]
    Io(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Key, grant or artifact error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Descriptor bytes did not decode
    #[error("Descriptor decode error: {0}")]
    Decode(#[from] CodecError),

    /// Hard failure reported by the swarm engine
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The caller cancelled the session
    #[error("Cancelled")]
    Cancelled,

    /// A bounded wait expired
    #[error("Timed out after {0:?}")]
    TimedOut(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The state machine was driven out of order
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for NodeError {
    fn from(err: tokio::task::JoinError) -> Self {
        NodeError::Io(format!("blocking task failed: {}", err))
    }
}

impl NodeError {
    /// Create an I/O error naming the path involved
    pub fn io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        NodeError::Io(format!("{}: {}", path.display(), err))
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::Io(_) => ErrorKind::Io,
            NodeError::Storage(StorageError::InvalidPieceLength(_)) => ErrorKind::Config,
            NodeError::Storage(_) => ErrorKind::Io,
            NodeError::Crypto(err) => match err {
                CryptoError::InvalidKey(_) => ErrorKind::InvalidKey,
                CryptoError::Authentication => ErrorKind::Authentication,
                CryptoError::MalformedArtifact { .. } => ErrorKind::MalformedArtifact,
                CryptoError::EncryptionFailed(_) => ErrorKind::Internal,
                CryptoError::RecipientNotFound(_) => ErrorKind::NotFound,
                CryptoError::GrantExists(_) => ErrorKind::GrantConflict,
            },
            NodeError::Decode(_) => ErrorKind::Decode,
            NodeError::Engine(_) => ErrorKind::Engine,
            NodeError::Cancelled => ErrorKind::Cancelled,
            NodeError::TimedOut(_) => ErrorKind::TimedOut,
            NodeError::Config(_) => ErrorKind::Config,
            NodeError::InvalidTransition { .. } => ErrorKind::Internal,
        }
    }
}

/// Result type alias for orchestrator operations
pub type NodeResult<T> = Result<T, NodeError>;

/// Operating mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Publish,
    Host,
    Retrieve,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Publish => f.write_str("publish"),
            Mode::Host => f.write_str("host"),
            Mode::Retrieve => f.write_str("retrieve"),
        }
    }
}

/// Mode-level failure: which mode, which stage, and why
#[derive(Debug, Error)]
#[error("{mode} failed during {stage}: {error}")]
pub struct SessionFailure {
    pub mode: Mode,
    pub stage: Stage,
    #[source]
    pub error: NodeError,
}

impl SessionFailure {
    /// Classify the underlying error
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            NodeError::from(CryptoError::Authentication).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            NodeError::from(CryptoError::InvalidKey("short".into())).kind(),
            ErrorKind::InvalidKey
        );
        assert_eq!(
            NodeError::from(CryptoError::MalformedArtifact {
                expected: 12,
                actual: 3
            })
            .kind(),
            ErrorKind::MalformedArtifact
        );
        assert_eq!(
            NodeError::from(CryptoError::RecipientNotFound("bob".into())).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            NodeError::from(CryptoError::GrantExists("bob".into())).kind(),
            ErrorKind::GrantConflict
        );
        assert_eq!(NodeError::from(CodecError::BadMagic).kind(), ErrorKind::Decode);
        assert_eq!(
            NodeError::from(EngineError::Failed("peer table".into())).kind(),
            ErrorKind::Engine
        );
        assert_eq!(
            NodeError::from(StorageError::Io("denied".into())).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            NodeError::from(StorageError::InvalidPieceLength(0)).kind(),
            ErrorKind::Config
        );
        assert_eq!(NodeError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            NodeError::TimedOut(Duration::from_secs(1)).kind(),
            ErrorKind::TimedOut
        );
    }

    #[test]
    fn test_session_failure_message() {
        let failure = SessionFailure {
            mode: Mode::Retrieve,
            stage: Stage::Decrypting,
            error: NodeError::from(CryptoError::Authentication),
        };
        let message = failure.to_string();
        assert!(message.starts_with("retrieve failed during decrypting: "));
        assert_eq!(failure.kind(), ErrorKind::Authentication);
    }
}
