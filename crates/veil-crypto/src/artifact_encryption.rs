//! Authenticated encryption of descriptor artifacts.
//!
//! This module seals and opens the serialized content descriptor with
//! ChaCha20-Poly1305. The on-disk artifact is the nonce followed by the
//! ciphertext (which carries the 16-byte Poly1305 tag at its end).
//!
//! ## Security Model
//!
//! - One 256-bit key per artifact, supplied by the caller
//! - A fresh random 96-bit nonce on every seal; a nonce is never chosen by
//!   the caller
//! - No associated data is bound in the current format
//! - Opening fails closed: a tag mismatch returns
//!   [`CryptoError::Authentication`] and no plaintext
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veil_crypto::{SecretKey, open_bytes, seal};
//!
//! let key = SecretKey::generate();
//! let artifact = seal(b"descriptor", &key)?;
//! let bytes = artifact.to_bytes();
//!
//! let descriptor = open_bytes(&bytes, &key)?;
//! assert_eq!(descriptor, b"descriptor");
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::key::SecretKey;

/// Nonce size for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Sealed descriptor: nonce plus authenticated ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArtifact {
    /// Nonce used for encryption (12 bytes)
    pub nonce: [u8; NONCE_SIZE],
    /// Encrypted content with authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedArtifact {
    /// Convert to bytes (nonce || ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse from bytes (nonce || ciphertext)
    ///
    /// Splits at the fixed nonce offset; anything shorter than a nonce is
    /// rejected as malformed.
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        if data.len() < NONCE_SIZE {
            return Err(CryptoError::MalformedArtifact {
                expected: NONCE_SIZE,
                actual: data.len(),
            });
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&data[..NONCE_SIZE]);

        Ok(Self {
            nonce,
            ciphertext: data[NONCE_SIZE..].to_vec(),
        })
    }

    /// Total size of the encoded artifact
    pub fn size(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }
}

/// Seal a plaintext under `key`
///
/// Each call draws a new random nonce from the thread-local CSPRNG.
pub fn seal(plaintext: &[u8], key: &SecretKey) -> CryptoResult<EncryptedArtifact> {
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::InvalidKey("cipher rejected key".to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedArtifact {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Seal with a raw key slice, which must be exactly 32 bytes
pub fn seal_with_key_bytes(plaintext: &[u8], key: &[u8]) -> CryptoResult<EncryptedArtifact> {
    let key = SecretKey::from_slice(key)?;
    seal(plaintext, &key)
}

/// Open a sealed artifact
///
/// # Errors
///
/// Returns [`CryptoError::Authentication`] if:
/// - The key is incorrect
/// - The nonce or ciphertext has been tampered with
/// - The ciphertext is too short to carry a tag
pub fn open(artifact: &EncryptedArtifact, key: &SecretKey) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::InvalidKey("cipher rejected key".to_string()))?;

    let nonce = Nonce::from_slice(&artifact.nonce);

    cipher
        .decrypt(nonce, artifact.ciphertext.as_slice())
        .map_err(|_| CryptoError::Authentication)
}

/// Parse and open an artifact from raw bytes
pub fn open_bytes(data: &[u8], key: &SecretKey) -> CryptoResult<Vec<u8>> {
    let artifact = EncryptedArtifact::from_bytes(data)?;
    open(&artifact, key)
}
