//! Error types for veil-crypto
//!
//! Messages never include key material.

use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Authentication failed: artifact was tampered with or the key is wrong")]
    Authentication,

    #[error("Malformed artifact: expected at least {expected} bytes, got {actual}")]
    MalformedArtifact { expected: usize, actual: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Recipient {0} already holds a different key; rotate the grant to replace it")]
    GrantExists(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_error_display() {
        let err = CryptoError::InvalidKey("wrong length".to_string());
        assert!(format!("{}", err).contains("Invalid key"));
        assert!(format!("{}", err).contains("wrong length"));

        let err = CryptoError::Authentication;
        assert!(format!("{}", err).contains("Authentication failed"));

        let err = CryptoError::MalformedArtifact {
            expected: 12,
            actual: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed artifact"));
        assert!(msg.contains("12"));
        assert!(msg.contains('4'));

        let err = CryptoError::RecipientNotFound("user9".to_string());
        assert!(format!("{}", err).contains("user9"));

        let err = CryptoError::GrantExists("user1".to_string());
        assert!(format!("{}", err).contains("rotate"));
    }
}
