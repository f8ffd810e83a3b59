//! Recipient access grants
//!
//! An [`AccessRegistry`] maps recipient identifiers to the key that opens
//! their artifacts. It lives for the duration of a publish run (or the life
//! of a long-running service) and is never persisted here; handing keys to
//! recipients happens out-of-band.
//!
//! Re-issuing is deliberately strict: [`AccessRegistry::issue`] refuses to
//! replace an existing grant with a different key. Replacing a key is an
//! explicit [`AccessRegistry::rotate`], which bumps the grant generation.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{CryptoError, CryptoResult};
use crate::key::SecretKey;

/// A recipient-to-key binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Opaque recipient identifier
    pub recipient_id: String,
    /// Key that seals this recipient's artifacts
    pub key: SecretKey,
    /// Starts at 1, incremented on every rotation
    pub generation: u32,
    /// When this generation was issued (unix seconds)
    pub issued_at: i64,
}

impl AccessGrant {
    fn new(recipient_id: &str, key: SecretKey, generation: u32) -> Self {
        Self {
            recipient_id: recipient_id.to_string(),
            key,
            generation,
            issued_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Registry of access grants
///
/// Reads take a shared lock, mutations an exclusive one. Share it between
/// concurrent operations with an `Arc`.
#[derive(Debug, Default)]
pub struct AccessRegistry {
    grants: RwLock<HashMap<String, AccessGrant>>,
}

impl AccessRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a grant for a recipient
    ///
    /// With `key_hex` omitted a fresh random key is generated. If the
    /// recipient already holds a grant, supplying the same key returns the
    /// existing grant unchanged; anything else is [`CryptoError::GrantExists`].
    pub fn issue(&self, recipient_id: &str, key_hex: Option<&str>) -> CryptoResult<AccessGrant> {
        let supplied = key_hex.map(SecretKey::from_hex).transpose()?;

        let mut grants = self.grants.write();
        if let Some(existing) = grants.get(recipient_id) {
            return match supplied {
                Some(key) if key == existing.key => {
                    debug!(recipient = recipient_id, "Grant already issued with this key");
                    Ok(existing.clone())
                }
                _ => Err(CryptoError::GrantExists(recipient_id.to_string())),
            };
        }

        let generated = supplied.is_none();
        let grant = AccessGrant::new(recipient_id, supplied.unwrap_or_else(SecretKey::generate), 1);
        grants.insert(recipient_id.to_string(), grant.clone());

        info!(recipient = recipient_id, generated, "Issued access grant");
        Ok(grant)
    }

    /// Replace a recipient's key, creating the grant if absent
    ///
    /// The generation is one more than the replaced grant's.
    pub fn rotate(&self, recipient_id: &str, key_hex: Option<&str>) -> CryptoResult<AccessGrant> {
        let key = match key_hex {
            Some(hex_str) => SecretKey::from_hex(hex_str)?,
            None => SecretKey::generate(),
        };

        let mut grants = self.grants.write();
        let generation = grants
            .get(recipient_id)
            .map(|g| g.generation.saturating_add(1))
            .unwrap_or(1);
        let grant = AccessGrant::new(recipient_id, key, generation);
        grants.insert(recipient_id.to_string(), grant.clone());

        info!(recipient = recipient_id, generation, "Rotated access grant");
        Ok(grant)
    }

    /// Look up a recipient's grant
    pub fn lookup(&self, recipient_id: &str) -> CryptoResult<AccessGrant> {
        self.grants
            .read()
            .get(recipient_id)
            .cloned()
            .ok_or_else(|| CryptoError::RecipientNotFound(recipient_id.to_string()))
    }

    /// Remove a recipient's grant
    pub fn revoke(&self, recipient_id: &str) -> Option<AccessGrant> {
        let removed = self.grants.write().remove(recipient_id);
        if removed.is_some() {
            info!(recipient = recipient_id, "Revoked access grant");
        }
        removed
    }

    /// Whether a recipient holds a grant
    pub fn contains(&self, recipient_id: &str) -> bool {
        self.grants.read().contains_key(recipient_id)
    }

    /// Number of grants
    pub fn len(&self) -> usize {
        self.grants.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.grants.read().is_empty()
    }

    /// Recipient identifiers, sorted
    pub fn recipients(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.grants.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
