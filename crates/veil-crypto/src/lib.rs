//! # Veil Crypto
//!
//! Cryptographic primitives for Veil.
//!
//! Provides authenticated encryption of descriptor artifacts and the
//! per-recipient key registry that decides who can open them.
//!
//! ## Features
//!
//! - ChaCha20-Poly1305 authenticated encryption with a fresh random nonce per seal
//! - Fail-closed opening: tag failures never yield plaintext
//! - 256-bit secret keys, zeroized on drop and redacted from debug output
//! - Explicit, lock-guarded access registry (no process-global state)
//!
//! ## Key Types
//!
//! - [`SecretKey`]: 32-byte symmetric key with hex interchange
//! - [`EncryptedArtifact`]: `nonce || ciphertext` on-disk form
//! - [`AccessRegistry`]: Recipient to key grants
//!
//! ## Example
//!
//! ```rust,ignore
//! use veil_crypto::{AccessRegistry, open, seal};
//!
//! let registry = AccessRegistry::new();
//! let grant = registry.issue("user1", None)?;
//!
//! let sealed = seal(b"descriptor bytes", &grant.key)?;
//! let opened = open(&sealed, &grant.key)?;
//! assert_eq!(opened, b"descriptor bytes");
//! ```

pub mod access;
pub mod artifact_encryption;
pub mod error;
pub mod key;

// Re-exports
pub use access::{AccessGrant, AccessRegistry};
pub use artifact_encryption::{
    EncryptedArtifact, NONCE_SIZE, TAG_SIZE, open, open_bytes, seal, seal_with_key_bytes,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{KEY_SIZE, SecretKey};
