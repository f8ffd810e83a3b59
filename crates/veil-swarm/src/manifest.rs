//! Seed manifests
//!
//! A seeder announces itself by writing `<rendezvous>/<content id>.seed`.
//! The manifest names the data directory holding verified content and the
//! address the seeder advertises. Manifests are postcard-encoded and
//! written atomically, so a fetcher never reads a torn manifest.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use veil_core::ContentId;
use veil_storage::write_atomic;

use crate::error::{SwarmError, SwarmResult};

/// File extension of seed manifests
pub const MANIFEST_EXTENSION: &str = "seed";

/// Advertisement of a complete, verified copy of some content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedManifest {
    /// Hex content id the manifest is for
    pub content_id: String,
    /// Data directory holding the content
    pub data_dir: PathBuf,
    /// Address advertised by the seeder
    pub listen_addr: String,
    /// When the seeder started (unix seconds)
    pub published_at: i64,
}

impl SeedManifest {
    /// Create a manifest stamped with the current time
    pub fn new(content_id: &ContentId, data_dir: &Path, listen_addr: impl ToString) -> Self {
        Self {
            content_id: content_id.to_hex(),
            data_dir: data_dir.to_path_buf(),
            listen_addr: listen_addr.to_string(),
            published_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Location of the manifest for `content_id`
    pub fn path_for(rendezvous_dir: &Path, content_id: &ContentId) -> PathBuf {
        rendezvous_dir.join(format!("{}.{}", content_id.to_hex(), MANIFEST_EXTENSION))
    }

    /// Atomically publish this manifest
    pub async fn publish(&self, rendezvous_dir: &Path) -> SwarmResult<PathBuf> {
        let path = rendezvous_dir.join(format!("{}.{}", self.content_id, MANIFEST_EXTENSION));
        let bytes = postcard::to_allocvec(self)?;
        write_atomic(&path, &bytes).await?;
        debug!(path = %path.display(), "Published seed manifest");
        Ok(path)
    }

    /// Read the manifest for `content_id`, if a seeder has published one
    pub async fn read(rendezvous_dir: &Path, content_id: &ContentId) -> SwarmResult<Option<Self>> {
        let path = Self::path_for(rendezvous_dir, content_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SwarmError::Manifest(format!("{}: {}", path.display(), e)));
            }
        };

        let manifest: Self = postcard::from_bytes(&bytes)?;
        if manifest.content_id != content_id.to_hex() {
            return Err(SwarmError::Manifest(format!(
                "{} names content {}",
                path.display(),
                manifest.content_id
            )));
        }
        Ok(Some(manifest))
    }

    /// Remove the manifest for `content_id` if it still points at `data_dir`
    ///
    /// Another seeder may have replaced it since; that manifest is left alone.
    pub async fn withdraw(
        rendezvous_dir: &Path,
        content_id: &ContentId,
        data_dir: &Path,
    ) -> SwarmResult<bool> {
        match Self::read(rendezvous_dir, content_id).await? {
            Some(manifest) if manifest.data_dir == data_dir => {}
            _ => return Ok(false),
        }

        let path = Self::path_for(rendezvous_dir, content_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Withdrew seed manifest");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SwarmError::Manifest(format!("{}: {}", path.display(), e))),
        }
    }
}
