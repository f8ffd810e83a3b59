//! Directory rendezvous engine
//!
//! Every participant shares a rendezvous directory. A session whose local
//! content fully verifies becomes a seeder and publishes a
//! [`SeedManifest`]; any other session runs a [`FetchTask`] that copies
//! missing pieces from the seeder's data directory, verifying each piece
//! against the descriptor before it is written.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use veil_core::{
    ContentDescriptor, ContentId, EngineError, EngineResult, SessionHandle, SwarmEngine,
    TransferProgress,
};
use veil_storage::{ContentLayout, StorageError};

use crate::config::SwarmConfig;
use crate::error::{SwarmError, SwarmResult};
use crate::manifest::SeedManifest;

/// Readiness of a session's local content check
#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    Checking,
    Ready,
    Failed(String),
}

/// What a session is doing after `begin_full_transfer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Idle,
    Seeding,
    Fetching,
}

/// State shared between a session and its background tasks
struct SessionShared {
    layout: Arc<ContentLayout>,
    content_id: ContentId,
    data_dir: PathBuf,
    pieces: Mutex<Vec<bool>>,
    readiness: watch::Sender<Readiness>,
    failure: Mutex<Option<String>>,
    role: Mutex<Role>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    peer_hints: Mutex<Vec<SocketAddr>>,
}

impl SessionShared {
    fn fail(&self, reason: String) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(reason);
        }
    }

    fn missing_pieces(&self) -> Vec<usize> {
        self.pieces
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, ok)| !**ok)
            .map(|(index, _)| index)
            .collect()
    }

    fn is_complete(&self) -> bool {
        self.pieces.lock().iter().all(|ok| *ok)
    }
}

/// Filesystem-backed swarm engine
pub struct DirectorySwarm {
    config: SwarmConfig,
    sessions: DashMap<SessionHandle, Arc<SessionShared>>,
    next_handle: AtomicU64,
}

impl DirectorySwarm {
    /// Create an engine over the configured rendezvous directory
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// The engine configuration
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Peer hints recorded for a session
    pub fn peer_hints(&self, session: SessionHandle) -> Vec<SocketAddr> {
        self.sessions
            .get(&session)
            .map(|s| s.peer_hints.lock().clone())
            .unwrap_or_default()
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, handle: SessionHandle) -> EngineResult<Arc<SessionShared>> {
        self.sessions
            .get(&handle)
            .map(|s| Arc::clone(s.value()))
            .ok_or(EngineError::UnknownSession(handle))
    }

    /// Absolute form of a session's data directory
    ///
    /// Manifests are read by other processes, so a relative directory would
    /// resolve against the wrong working directory.
    async fn resolve_data_dir(data_dir: &Path) -> EngineResult<PathBuf> {
        match tokio::fs::canonicalize(data_dir).await {
            Ok(resolved) => Ok(resolved),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => std::path::absolute(data_dir)
                .map_err(|e| EngineError::Io(format!("{}: {}", data_dir.display(), e))),
            Err(e) => Err(EngineError::Io(format!("{}: {}", data_dir.display(), e))),
        }
    }

    async fn start_seeding(&self, handle: SessionHandle, shared: &SessionShared) -> SwarmResult<()> {
        let manifest = SeedManifest::new(
            &shared.content_id,
            &shared.data_dir,
            self.config.listen_addr,
        );
        let path = manifest.publish(&self.config.rendezvous_dir).await?;
        info!(
            %handle,
            content_id = %shared.content_id.short_hex(),
            manifest = %path.display(),
            listen_addr = %self.config.listen_addr,
            "Seeding content"
        );
        Ok(())
    }
}

#[async_trait]
impl SwarmEngine for DirectorySwarm {
    #[instrument(skip(self, descriptor), fields(name = %descriptor.name, data_dir = %data_dir.display()))]
    async fn register_descriptor(
        &self,
        descriptor: &ContentDescriptor,
        data_dir: &Path,
    ) -> EngineResult<SessionHandle> {
        descriptor
            .validate()
            .map_err(|e| EngineError::Rejected(e.to_string()))?;

        let data_dir = Self::resolve_data_dir(data_dir).await?;
        let handle = SessionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let (readiness, _) = watch::channel(Readiness::Checking);
        let shared = Arc::new(SessionShared {
            layout: Arc::new(ContentLayout::new(descriptor.clone(), &data_dir)),
            content_id: descriptor.content_id(),
            data_dir,
            pieces: Mutex::new(vec![false; descriptor.piece_count()]),
            readiness,
            failure: Mutex::new(None),
            role: Mutex::new(Role::Idle),
            tasks: Mutex::new(Vec::new()),
            peer_hints: Mutex::new(Vec::new()),
        });

        let task_shared = Arc::clone(&shared);
        let verify = tokio::spawn(async move {
            let layout = Arc::clone(&task_shared.layout);
            let outcome = tokio::task::spawn_blocking(move || layout.verify_all())
                .await
                .map_err(SwarmError::from)
                .and_then(|result| result.map_err(SwarmError::from));

            match outcome {
                Ok(flags) => {
                    let present = flags.iter().filter(|ok| **ok).count();
                    debug!(%handle, present, total = flags.len(), "Local content checked");
                    *task_shared.pieces.lock() = flags;
                    task_shared.readiness.send_replace(Readiness::Ready);
                }
                Err(e) => {
                    warn!(%handle, error = %e, "Local content check failed");
                    task_shared
                        .readiness
                        .send_replace(Readiness::Failed(e.to_string()));
                }
            }
        });
        shared.tasks.lock().push(verify);

        self.sessions.insert(handle, shared);
        debug!(%handle, "Registered descriptor");
        Ok(handle)
    }

    async fn await_metadata_ready(&self, session: SessionHandle) -> EngineResult<()> {
        let shared = self.session(session)?;
        let mut rx = shared.readiness.subscribe();

        let state = rx
            .wait_for(|r| *r != Readiness::Checking)
            .await
            .map_err(|_| EngineError::UnknownSession(session))?
            .clone();

        match state {
            Readiness::Failed(reason) => Err(EngineError::Failed(reason)),
            _ => Ok(()),
        }
    }

    async fn begin_full_transfer(&self, session: SessionHandle) -> EngineResult<()> {
        let shared = self.session(session)?;

        match &*shared.readiness.borrow() {
            Readiness::Ready => {}
            Readiness::Checking => {
                return Err(EngineError::Failed("local content check still running".into()));
            }
            Readiness::Failed(reason) => return Err(EngineError::Failed(reason.clone())),
        }

        // Claim the role before acting so concurrent callers start at most once
        let seeding = {
            let mut role = shared.role.lock();
            if *role != Role::Idle {
                return Ok(());
            }
            let seeding = shared.is_complete();
            *role = if seeding { Role::Seeding } else { Role::Fetching };
            seeding
        };

        if seeding {
            if let Err(e) = self.start_seeding(session, &shared).await {
                *shared.role.lock() = Role::Idle;
                return Err(e.into());
            }
        } else {
            let task = FetchTask::spawn(
                session,
                Arc::clone(&shared),
                self.config.rendezvous_dir.clone(),
                self.config.poll_interval,
            );
            shared.tasks.lock().push(task);
        }
        Ok(())
    }

    async fn query_progress(&self, session: SessionHandle) -> EngineResult<TransferProgress> {
        let shared = self.session(session)?;

        if let Some(reason) = shared.failure.lock().clone() {
            return Err(EngineError::Failed(reason));
        }

        let pieces = shared.pieces.lock().clone();
        Ok(TransferProgress {
            bytes_transferred: shared.layout.verified_bytes(&pieces),
            total_bytes: shared.layout.descriptor().total_length(),
            is_complete: pieces.iter().all(|ok| *ok),
        })
    }

    async fn add_peer_hint(&self, session: SessionHandle, address: SocketAddr) -> EngineResult<()> {
        let shared = self.session(session)?;
        shared.peer_hints.lock().push(address);
        info!(%session, peer = %address, "Recorded peer hint");
        Ok(())
    }

    async fn close(&self, session: SessionHandle) -> EngineResult<()> {
        let Some((_, shared)) = self.sessions.remove(&session) else {
            return Ok(());
        };

        for task in shared.tasks.lock().drain(..) {
            task.abort();
        }

        let seeding = *shared.role.lock() == Role::Seeding;
        if seeding {
            SeedManifest::withdraw(
                &self.config.rendezvous_dir,
                &shared.content_id,
                &shared.data_dir,
            )
            .await?;
        }

        debug!(%session, "Closed session");
        Ok(())
    }
}

/// Background task copying missing pieces from a seeder
struct FetchTask {
    handle: SessionHandle,
    shared: Arc<SessionShared>,
    rendezvous_dir: PathBuf,
    poll_interval: std::time::Duration,
}

/// Outcome of one fetch round
enum RoundOutcome {
    Progress(Vec<usize>),
    HardError(StorageError),
}

impl FetchTask {
    fn spawn(
        handle: SessionHandle,
        shared: Arc<SessionShared>,
        rendezvous_dir: PathBuf,
        poll_interval: std::time::Duration,
    ) -> JoinHandle<()> {
        let task = Self {
            handle,
            shared,
            rendezvous_dir,
            poll_interval,
        };
        tokio::spawn(async move {
            task.run().await;
        })
    }

    async fn run(self) {
        info!(
            session = %self.handle,
            content_id = %self.shared.content_id.short_hex(),
            "Fetch task started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        let mut waiting_logged = false;

        loop {
            interval.tick().await;

            let manifest =
                match SeedManifest::read(&self.rendezvous_dir, &self.shared.content_id).await {
                    Ok(Some(manifest)) => manifest,
                    Ok(None) => {
                        if !waiting_logged {
                            debug!(session = %self.handle, "No seeder yet, waiting");
                            waiting_logged = true;
                        }
                        continue;
                    }
                    Err(e) => {
                        warn!(session = %self.handle, error = %e, "Unreadable seed manifest");
                        continue;
                    }
                };

            if manifest.data_dir == self.shared.data_dir {
                continue;
            }

            match self.fetch_round(manifest.data_dir).await {
                Ok(RoundOutcome::Progress(written)) => {
                    if !written.is_empty() {
                        let mut pieces = self.shared.pieces.lock();
                        for index in &written {
                            pieces[*index] = true;
                        }
                        debug!(session = %self.handle, pieces = written.len(), "Fetched pieces");
                    }
                }
                Ok(RoundOutcome::HardError(e)) => {
                    warn!(session = %self.handle, error = %e, "Fetch failed");
                    self.shared.fail(e.to_string());
                    return;
                }
                Err(e) => {
                    warn!(session = %self.handle, error = %e, "Fetch round aborted");
                    self.shared.fail(e.to_string());
                    return;
                }
            }

            if self.shared.is_complete() {
                let layout = Arc::clone(&self.shared.layout);
                match tokio::task::spawn_blocking(move || layout.sync_all()).await {
                    Ok(Ok(())) => info!(session = %self.handle, "Fetch complete"),
                    Ok(Err(e)) => self.shared.fail(e.to_string()),
                    Err(e) => self.shared.fail(e.to_string()),
                }
                return;
            }
        }
    }

    /// Copy every missing piece the seeder can currently provide
    async fn fetch_round(&self, seeder_dir: PathBuf) -> SwarmResult<RoundOutcome> {
        let missing = self.shared.missing_pieces();
        let local = Arc::clone(&self.shared.layout);
        let handle = self.handle;

        let outcome = tokio::task::spawn_blocking(move || {
            let seeder = ContentLayout::new(local.descriptor().clone(), seeder_dir);
            let mut written = Vec::with_capacity(missing.len());

            for index in missing {
                let data = match seeder.read_piece(index) {
                    Ok(data) => data,
                    Err(e) => {
                        debug!(session = %handle, index, error = %e, "Seeder piece unavailable");
                        continue;
                    }
                };

                match local.write_piece(index, &data) {
                    Ok(()) => written.push(index),
                    Err(StorageError::Integrity { index }) => {
                        warn!(session = %handle, index, "Seeder piece failed verification, will retry");
                    }
                    Err(e) => return RoundOutcome::HardError(e),
                }
            }

            RoundOutcome::Progress(written)
        })
        .await?;

        Ok(outcome)
    }
}
