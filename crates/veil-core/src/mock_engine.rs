//! Mock swarm engine for testing
//!
//! Provides an in-memory [`SwarmEngine`] so orchestration logic can be
//! exercised without any peer-to-peer stack.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veil_core::{MockBehavior, MockEngine, SwarmEngine};
//!
//! // Readiness is held back until the test releases it
//! let engine = MockEngine::with_behavior(MockBehavior {
//!     ready_immediately: false,
//!     bytes_per_poll: 1024,
//!     ..Default::default()
//! });
//!
//! let session = engine.register_descriptor(&descriptor, dir.path()).await?;
//! engine.mark_ready(session);
//! engine.await_metadata_ready(session).await?;
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::descriptor::ContentDescriptor;
use crate::engine::{SessionHandle, SwarmEngine, TransferProgress};
use crate::error::{EngineError, EngineResult};

/// Scripted behaviour of a [`MockEngine`]
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Signal metadata readiness as soon as a descriptor is registered
    pub ready_immediately: bool,
    /// Bytes added to progress on each query once transfer has begun
    pub bytes_per_poll: u64,
    /// Content is already complete locally when registered (seeding)
    pub content_present: bool,
    /// Fail `register_descriptor` with this message
    pub fail_register: Option<String>,
    /// Fail `await_metadata_ready` with this message
    pub fail_readiness: Option<String>,
    /// Fail `begin_full_transfer` with this message
    pub fail_transfer: Option<String>,
    /// Fail `query_progress` after this many successful queries
    pub fail_progress_after: Option<u32>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            ready_immediately: true,
            bytes_per_poll: u64::MAX,
            content_present: false,
            fail_register: None,
            fail_readiness: None,
            fail_transfer: None,
            fail_progress_after: None,
        }
    }
}

/// A call observed by the mock engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Register { name: String, data_dir: PathBuf },
    AwaitReady(SessionHandle),
    BeginTransfer(SessionHandle),
    QueryProgress(SessionHandle),
    PeerHint(SessionHandle, SocketAddr),
    Close(SessionHandle),
}

struct MockSession {
    descriptor: ContentDescriptor,
    transferred: u64,
    transferring: bool,
    polls: u32,
    peer_hints: Vec<SocketAddr>,
    ready_tx: watch::Sender<bool>,
}

/// An in-memory swarm engine
///
/// Sessions live in a map keyed by handle; readiness is a watch channel
/// per session so tests can hold it back and release it explicitly.
pub struct MockEngine {
    behavior: MockBehavior,
    sessions: DashMap<SessionHandle, MockSession>,
    next_handle: AtomicU64,
    calls: Mutex<Vec<EngineCall>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create an engine that is ready immediately and completes on the first poll
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::default())
    }

    /// Create an engine with scripted behaviour
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            sessions: DashMap::new(),
            next_handle: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Release metadata readiness for a session
    ///
    /// Returns false if the session does not exist.
    pub fn mark_ready(&self, session: SessionHandle) -> bool {
        match self.sessions.get(&session) {
            Some(entry) => {
                entry.ready_tx.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// All calls observed so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Peer hints recorded for a session
    pub fn peer_hints(&self, session: SessionHandle) -> Vec<SocketAddr> {
        self.sessions
            .get(&session)
            .map(|s| s.peer_hints.clone())
            .unwrap_or_default()
    }

    /// The descriptor registered for a session
    pub fn registered_descriptor(&self, session: SessionHandle) -> Option<ContentDescriptor> {
        self.sessions.get(&session).map(|s| s.descriptor.clone())
    }

    /// Number of sessions not yet closed
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn record(&self, call: EngineCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

#[async_trait]
impl SwarmEngine for MockEngine {
    async fn register_descriptor(
        &self,
        descriptor: &ContentDescriptor,
        data_dir: &Path,
    ) -> EngineResult<SessionHandle> {
        self.record(EngineCall::Register {
            name: descriptor.name.clone(),
            data_dir: data_dir.to_path_buf(),
        });

        if let Some(msg) = &self.behavior.fail_register {
            return Err(EngineError::Rejected(msg.clone()));
        }

        let handle = SessionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (ready_tx, _) = watch::channel(self.behavior.ready_immediately);
        let transferred = if self.behavior.content_present {
            descriptor.total_length()
        } else {
            0
        };

        self.sessions.insert(
            handle,
            MockSession {
                descriptor: descriptor.clone(),
                transferred,
                transferring: false,
                polls: 0,
                peer_hints: Vec::new(),
                ready_tx,
            },
        );

        debug!(%handle, name = %descriptor.name, "Mock engine registered descriptor");
        Ok(handle)
    }

    async fn await_metadata_ready(&self, session: SessionHandle) -> EngineResult<()> {
        self.record(EngineCall::AwaitReady(session));

        if let Some(msg) = &self.behavior.fail_readiness {
            return Err(EngineError::Failed(msg.clone()));
        }

        // Clone the receiver so no map guard is held across the await
        let mut ready_rx = self
            .sessions
            .get(&session)
            .map(|s| s.ready_tx.subscribe())
            .ok_or(EngineError::UnknownSession(session))?;

        ready_rx
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| EngineError::UnknownSession(session))?;

        Ok(())
    }

    async fn begin_full_transfer(&self, session: SessionHandle) -> EngineResult<()> {
        self.record(EngineCall::BeginTransfer(session));

        if let Some(msg) = &self.behavior.fail_transfer {
            return Err(EngineError::Failed(msg.clone()));
        }

        let mut entry = self
            .sessions
            .get_mut(&session)
            .ok_or(EngineError::UnknownSession(session))?;
        entry.transferring = true;
        Ok(())
    }

    async fn query_progress(&self, session: SessionHandle) -> EngineResult<TransferProgress> {
        self.record(EngineCall::QueryProgress(session));

        let mut entry = self
            .sessions
            .get_mut(&session)
            .ok_or(EngineError::UnknownSession(session))?;

        entry.polls += 1;
        if let Some(limit) = self.behavior.fail_progress_after
            && entry.polls > limit
        {
            return Err(EngineError::Failed(format!(
                "injected failure after {} polls",
                limit
            )));
        }

        let total = entry.descriptor.total_length();
        if entry.transferring {
            entry.transferred = entry
                .transferred
                .saturating_add(self.behavior.bytes_per_poll)
                .min(total);
        }

        Ok(TransferProgress {
            bytes_transferred: entry.transferred,
            total_bytes: total,
            is_complete: entry.transferred >= total
                && (entry.transferring || self.behavior.content_present),
        })
    }

    async fn add_peer_hint(&self, session: SessionHandle, address: SocketAddr) -> EngineResult<()> {
        self.record(EngineCall::PeerHint(session, address));

        let mut entry = self
            .sessions
            .get_mut(&session)
            .ok_or(EngineError::UnknownSession(session))?;
        entry.peer_hints.push(address);
        Ok(())
    }

    async fn close(&self, session: SessionHandle) -> EngineResult<()> {
        self.record(EngineCall::Close(session));
        self.sessions.remove(&session);
        Ok(())
    }
}
