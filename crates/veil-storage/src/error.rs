//! Error types for veil-storage
//!
//! This module defines the error types used throughout the storage crate.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while reading or writing content
    #[error("I/O error: {0}")]
    Io(String),

    /// Piece length was zero
    #[error("Invalid piece length {0}: must be positive")]
    InvalidPieceLength(u64),

    /// Source path cannot be described
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// A source file changed size while it was being hashed
    #[error("Source changed while building descriptor: {0}")]
    SourceChanged(String),

    /// Piece index or layout mismatch
    #[error("Layout error: {0}")]
    Layout(String),

    /// Piece data does not match its descriptor hash
    #[error("Piece {index} failed hash verification")]
    Integrity { index: usize },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create an I/O error naming the path involved
    pub fn io_at(path: &Path, err: std::io::Error) -> Self {
        Self::Io(format!("{}: {}", path.display(), err))
    }

    /// Create a new Layout error
    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout(message.into())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }

    #[test]
    fn test_io_at_names_path() {
        let err = StorageError::io_at(
            Path::new("/data/movie.mkv"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/data/movie.mkv"));
    }

    #[test]
    fn test_integrity_error() {
        let err = StorageError::Integrity { index: 3 };
        assert!(err.to_string().contains("Piece 3"));
    }
}
