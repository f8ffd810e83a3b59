//! Swarm engine capability
//!
//! The [`SwarmEngine`] trait is the seam between the Veil pipeline and
//! whatever peer-to-peer stack actually moves bytes. The orchestrator only
//! registers descriptors, waits for readiness, starts transfers and
//! observes progress; peer discovery, piece exchange and connectivity
//! retries all stay behind this trait.
//!
//! ## Implementations
//!
//! - [`MockEngine`](crate::MockEngine): In-memory engine for tests (in this crate)
//! - `DirectorySwarm`: Filesystem rendezvous engine (in veil-swarm crate)

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use async_trait::async_trait;

use crate::descriptor::ContentDescriptor;
use crate::error::EngineResult;

/// Handle to a registered descriptor inside an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Create a handle from a raw engine-assigned value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Transfer progress reported by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferProgress {
    /// Bytes of content present and verified locally
    pub bytes_transferred: u64,
    /// Total content length
    pub total_bytes: u64,
    /// Whether every piece is present and verified
    pub is_complete: bool,
}

impl TransferProgress {
    /// Completion percentage (100 for empty content)
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Capability interface to a peer-to-peer swarm engine
///
/// Engines run their own internal concurrency; every method here is a
/// short call into the engine except [`await_metadata_ready`], which
/// suspends until the engine has what it needs to serve the session.
/// Callers bound that wait themselves (timeouts, cancellation).
///
/// [`await_metadata_ready`]: SwarmEngine::await_metadata_ready
#[async_trait]
pub trait SwarmEngine: Send + Sync {
    /// Register a descriptor with content stored under `data_dir`
    ///
    /// Content already present under `data_dir` counts towards progress,
    /// so registering complete content makes the session a seeder.
    async fn register_descriptor(
        &self,
        descriptor: &ContentDescriptor,
        data_dir: &Path,
    ) -> EngineResult<SessionHandle>;

    /// Suspend until the session's metadata is ready
    async fn await_metadata_ready(&self, session: SessionHandle) -> EngineResult<()>;

    /// Fetch all missing content and serve what is present
    async fn begin_full_transfer(&self, session: SessionHandle) -> EngineResult<()>;

    /// Current transfer progress
    async fn query_progress(&self, session: SessionHandle) -> EngineResult<TransferProgress>;

    /// Suggest a peer address for direct bootstrapping
    ///
    /// Default implementation accepts and ignores the hint.
    async fn add_peer_hint(&self, _session: SessionHandle, _address: SocketAddr) -> EngineResult<()> {
        Ok(())
    }

    /// Release a session
    ///
    /// Default implementation does nothing.
    async fn close(&self, _session: SessionHandle) -> EngineResult<()> {
        Ok(())
    }
}
