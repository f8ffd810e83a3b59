//! Error types for Veil core

use thiserror::Error;

use crate::engine::SessionHandle;

/// Errors produced while decoding a serialized descriptor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Bad magic: not a Veil descriptor")]
    BadMagic,

    #[error("Unsupported descriptor format version {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed descriptor: {0}")]
    Malformed(String),

    #[error("Trailing bytes after descriptor: {0} bytes")]
    TrailingBytes(usize),

    #[error("Invalid descriptor: {0}")]
    Invalid(String),

    #[error("Descriptor encoding is not canonical")]
    NonCanonical,
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Hard errors reported by a swarm engine
///
/// Transient conditions (no peers yet, slow connections) are never
/// reported through this type; engines surface them as "not ready" or
/// "not complete" instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown session: {0}")]
    UnknownSession(SessionHandle),

    #[error("Descriptor rejected: {0}")]
    Rejected(String),

    #[error("Engine failure: {0}")]
    Failed(String),

    #[error("Engine I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
