//! Publish, host and retrieve sessions

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use veil_core::{ContentDescriptor, ContentId, SessionHandle, SwarmEngine, TransferProgress, codec};
use veil_crypto::{AccessGrant, AccessRegistry, CryptoError, SecretKey, open_bytes, seal};
use veil_storage::{DescriptorBuilder, write_atomic};

use crate::config::NodeConfig;
use crate::error::{Mode, NodeError, NodeResult, SessionFailure};
use crate::state::{SessionState, SessionTracker};
use crate::wait;

/// File extension of plain descriptors
pub const DESCRIPTOR_EXTENSION: &str = "veil";

/// File extension of sealed artifacts
pub const ARTIFACT_EXTENSION: &str = "veil.sealed";

/// Input to a publish session
#[derive(Clone)]
pub struct PublishRequest {
    /// File or directory to describe
    pub source: PathBuf,
    /// Directory receiving the artifact (and plain descriptor)
    pub output_dir: PathBuf,
    /// Recipient whose grant seals the artifact
    pub recipient_id: String,
    /// Hex key to grant; omitted reuses an existing grant or generates one
    pub key_hex: Option<String>,
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("source", &self.source)
            .field("output_dir", &self.output_dir)
            .field("recipient_id", &self.recipient_id)
            .field("key_hex", &self.key_hex.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Outcome of a publish session
///
/// The receipt is the only place key material leaves the orchestrator.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub recipient_id: String,
    pub generation: u32,
    pub name: String,
    pub content_id: ContentId,
    pub piece_count: usize,
    pub total_length: u64,
    pub artifact_path: PathBuf,
    pub descriptor_path: Option<PathBuf>,
    key: SecretKey,
}

impl PublishReceipt {
    /// The key sealing the artifact
    pub fn key(&self) -> &SecretKey {
        &self.key
    }

    /// The key as lowercase hex, for out-of-band delivery
    pub fn key_hex(&self) -> String {
        self.key.to_hex()
    }
}

/// Input to a host session
#[derive(Debug, Clone)]
pub struct HostRequest {
    /// Plain descriptor written by publish
    pub descriptor_path: PathBuf,
    /// Directory containing the content; defaults to the descriptor's directory
    pub data_dir: Option<PathBuf>,
    /// Peers to contact directly
    pub peer_hints: Vec<SocketAddr>,
}

/// Outcome of a host session
#[derive(Debug, Clone)]
pub struct HostReport {
    pub name: String,
    pub content_id: ContentId,
    pub data_dir: PathBuf,
    /// Last progress observed before the session stopped
    pub progress: TransferProgress,
}

/// Input to a retrieve session
#[derive(Clone)]
pub struct RetrieveRequest {
    /// Sealed artifact
    pub artifact_path: PathBuf,
    /// Recipient the artifact was sealed for
    pub recipient_id: String,
    /// Hex key; omitted looks up the recipient's grant
    pub key_hex: Option<String>,
    /// Directory receiving the content
    pub output_dir: PathBuf,
    /// Peers to contact directly
    pub peer_hints: Vec<SocketAddr>,
}

impl fmt::Debug for RetrieveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieveRequest")
            .field("artifact_path", &self.artifact_path)
            .field("recipient_id", &self.recipient_id)
            .field("key_hex", &self.key_hex.as_ref().map(|_| "<redacted>"))
            .field("output_dir", &self.output_dir)
            .field("peer_hints", &self.peer_hints)
            .finish()
    }
}

/// Outcome of a retrieve session
#[derive(Debug, Clone)]
pub struct RetrieveReport {
    pub descriptor: ContentDescriptor,
    pub content_id: ContentId,
    /// Where the content now lives
    pub content_path: PathBuf,
    pub progress: TransferProgress,
}

/// Drives sessions against a swarm engine
pub struct Orchestrator<E: SwarmEngine + ?Sized> {
    config: NodeConfig,
    registry: Arc<AccessRegistry>,
    engine: Arc<E>,
}

impl<E: SwarmEngine + ?Sized> Orchestrator<E> {
    /// Create an orchestrator
    pub fn new(config: NodeConfig, registry: Arc<AccessRegistry>, engine: Arc<E>) -> Self {
        Self {
            config,
            registry,
            engine,
        }
    }

    /// The orchestrator configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The access registry grants are issued from
    pub fn registry(&self) -> &Arc<AccessRegistry> {
        &self.registry
    }

    /// The underlying engine
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Describe, seal and write an artifact for one recipient
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, SessionFailure> {
        self.publish_tracked(request, &SessionTracker::new(Mode::Publish))
            .await
    }

    /// [`publish`](Self::publish), reporting transitions through `tracker`
    #[instrument(skip_all, fields(source = %request.source.display(), recipient = %request.recipient_id))]
    pub async fn publish_tracked(
        &self,
        request: PublishRequest,
        tracker: &SessionTracker,
    ) -> Result<PublishReceipt, SessionFailure> {
        let result = self.run_publish(request, tracker).await;
        conclude(tracker, result)
    }

    /// Serve local content described by a plain descriptor until cancelled
    pub async fn host(
        &self,
        request: HostRequest,
        token: CancellationToken,
    ) -> Result<HostReport, SessionFailure> {
        self.host_tracked(request, token, &SessionTracker::new(Mode::Host))
            .await
    }

    /// [`host`](Self::host), reporting transitions through `tracker`
    #[instrument(skip_all, fields(descriptor = %request.descriptor_path.display()))]
    pub async fn host_tracked(
        &self,
        request: HostRequest,
        token: CancellationToken,
        tracker: &SessionTracker,
    ) -> Result<HostReport, SessionFailure> {
        let result = self.run_host(request, &token, tracker).await;
        conclude(tracker, result)
    }

    /// Open an artifact and fetch the content it describes
    pub async fn retrieve(
        &self,
        request: RetrieveRequest,
        token: CancellationToken,
    ) -> Result<RetrieveReport, SessionFailure> {
        self.retrieve_tracked(request, token, &SessionTracker::new(Mode::Retrieve))
            .await
    }

    /// [`retrieve`](Self::retrieve), reporting transitions through `tracker`
    #[instrument(skip_all, fields(artifact = %request.artifact_path.display(), recipient = %request.recipient_id))]
    pub async fn retrieve_tracked(
        &self,
        request: RetrieveRequest,
        token: CancellationToken,
        tracker: &SessionTracker,
    ) -> Result<RetrieveReport, SessionFailure> {
        let result = self.run_retrieve(request, &token, tracker).await;
        conclude(tracker, result)
    }

    async fn run_publish(
        &self,
        request: PublishRequest,
        tracker: &SessionTracker,
    ) -> NodeResult<PublishReceipt> {
        tracker.advance(SessionState::Building)?;
        if self.config.piece_length == 0 {
            return Err(NodeError::Config("piece length must be positive".into()));
        }

        let builder = DescriptorBuilder::new(self.config.piece_length)
            .announce(self.config.announce.clone())
            .created_by(self.config.created_by.clone())
            .private(self.config.private);
        let source = request.source.clone();
        let descriptor = tokio::task::spawn_blocking(move || builder.build(&source)).await??;

        tracker.advance(SessionState::Encrypting)?;
        let encoded = codec::encode(&descriptor);
        let grant = self.grant_for(&request.recipient_id, request.key_hex.as_deref())?;
        let sealed = seal(&encoded, &grant.key)?;

        let artifact_path = request
            .output_dir
            .join(format!("{}.{}", descriptor.name, ARTIFACT_EXTENSION));
        write_atomic(&artifact_path, &sealed.to_bytes()).await?;

        let descriptor_path = if self.config.write_plain_descriptor {
            let path = request
                .output_dir
                .join(format!("{}.{}", descriptor.name, DESCRIPTOR_EXTENSION));
            write_atomic(&path, &encoded).await?;
            Some(path)
        } else {
            None
        };

        let content_id = descriptor.content_id();
        info!(
            name = %descriptor.name,
            %content_id,
            pieces = descriptor.piece_count(),
            total_length = descriptor.total_length(),
            artifact = %artifact_path.display(),
            generation = grant.generation,
            "Published sealed artifact"
        );
        tracker.advance(SessionState::Published)?;

        Ok(PublishReceipt {
            recipient_id: grant.recipient_id.clone(),
            generation: grant.generation,
            name: descriptor.name.clone(),
            content_id,
            piece_count: descriptor.piece_count(),
            total_length: descriptor.total_length(),
            artifact_path,
            descriptor_path,
            key: grant.key,
        })
    }

    /// Supplied key: issue (idempotent for the same key). Otherwise reuse the
    /// recipient's grant, generating one for a new recipient.
    fn grant_for(&self, recipient_id: &str, key_hex: Option<&str>) -> NodeResult<AccessGrant> {
        if key_hex.is_some() {
            return Ok(self.registry.issue(recipient_id, key_hex)?);
        }

        match self.registry.lookup(recipient_id) {
            Ok(grant) => {
                debug!(recipient = recipient_id, generation = grant.generation, "Reusing grant");
                Ok(grant)
            }
            Err(CryptoError::RecipientNotFound(_)) => Ok(self.registry.issue(recipient_id, None)?),
            Err(e) => Err(e.into()),
        }
    }

    async fn run_host(
        &self,
        request: HostRequest,
        token: &CancellationToken,
        tracker: &SessionTracker,
    ) -> NodeResult<HostReport> {
        tracker.advance(SessionState::Decrypting)?;
        let bytes = tokio::fs::read(&request.descriptor_path)
            .await
            .map_err(|e| NodeError::io_at(&request.descriptor_path, e))?;
        let descriptor = codec::decode(&bytes)?;

        let data_dir = match request.data_dir {
            Some(dir) => dir,
            None => parent_or_current(&request.descriptor_path),
        };

        tracker.advance(SessionState::Registering)?;
        let session = self.engine.register_descriptor(&descriptor, &data_dir).await?;
        info!(%session, name = %descriptor.name, data_dir = %data_dir.display(), "Registered for hosting");

        let outcome = self
            .drive_host(session, &request.peer_hints, token, tracker)
            .await;
        self.close_session(session).await;
        let progress = outcome?;

        tracker.advance(SessionState::Complete)?;
        Ok(HostReport {
            name: descriptor.name.clone(),
            content_id: descriptor.content_id(),
            data_dir,
            progress,
        })
    }

    async fn drive_host(
        &self,
        session: SessionHandle,
        peer_hints: &[SocketAddr],
        token: &CancellationToken,
        tracker: &SessionTracker,
    ) -> NodeResult<TransferProgress> {
        self.prepare_transfer(session, peer_hints, token, tracker)
            .await?;

        info!(%session, "Hosting content until cancelled");
        let engine = &*self.engine;
        wait::serve_until_cancelled(
            move || engine.query_progress(session),
            self.config.poll_interval,
            token,
        )
        .await
    }

    async fn run_retrieve(
        &self,
        request: RetrieveRequest,
        token: &CancellationToken,
        tracker: &SessionTracker,
    ) -> NodeResult<RetrieveReport> {
        tracker.advance(SessionState::Decrypting)?;
        let key = match request.key_hex.as_deref() {
            Some(hex) => SecretKey::from_hex(hex)?,
            None => self.registry.lookup(&request.recipient_id)?.key,
        };

        let sealed = tokio::fs::read(&request.artifact_path)
            .await
            .map_err(|e| NodeError::io_at(&request.artifact_path, e))?;
        let plaintext = open_bytes(&sealed, &key)?;
        let descriptor = codec::decode(&plaintext)?;
        let content_id = descriptor.content_id();
        info!(
            name = %descriptor.name,
            %content_id,
            pieces = descriptor.piece_count(),
            total_length = descriptor.total_length(),
            "Opened artifact"
        );

        tracker.advance(SessionState::Registering)?;
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|e| NodeError::io_at(&request.output_dir, e))?;
        let session = self
            .engine
            .register_descriptor(&descriptor, &request.output_dir)
            .await?;
        debug!(%session, "Registered for retrieval");

        let outcome = self
            .drive_retrieve(session, &request.peer_hints, token, tracker)
            .await;
        self.close_session(session).await;
        let progress = outcome?;

        tracker.advance(SessionState::Complete)?;
        Ok(RetrieveReport {
            content_path: request.output_dir.join(&descriptor.name),
            descriptor,
            content_id,
            progress,
        })
    }

    async fn drive_retrieve(
        &self,
        session: SessionHandle,
        peer_hints: &[SocketAddr],
        token: &CancellationToken,
        tracker: &SessionTracker,
    ) -> NodeResult<TransferProgress> {
        self.prepare_transfer(session, peer_hints, token, tracker)
            .await?;

        let engine = &*self.engine;
        let progress = wait::poll_until_complete(
            move || engine.query_progress(session),
            self.config.poll_interval,
            token,
            self.config.transfer_timeout,
        )
        .await?;

        info!(%session, bytes = progress.bytes_transferred, "Transfer complete");
        if !wait::linger(self.config.completion_linger, token).await {
            debug!(%session, "Linger cut short by cancellation");
        }
        Ok(progress)
    }

    /// Peer hints, readiness and transfer start shared by host and retrieve
    async fn prepare_transfer(
        &self,
        session: SessionHandle,
        peer_hints: &[SocketAddr],
        token: &CancellationToken,
        tracker: &SessionTracker,
    ) -> NodeResult<()> {
        for address in peer_hints {
            self.engine.add_peer_hint(session, *address).await?;
            debug!(%session, peer = %address, "Added peer hint");
        }

        tracker.advance(SessionState::AwaitingReadiness)?;
        wait::until_ready(
            self.engine.await_metadata_ready(session),
            token,
            self.config.readiness_timeout,
        )
        .await?;

        tracker.advance(SessionState::Transferring)?;
        self.engine.begin_full_transfer(session).await?;
        Ok(())
    }

    async fn close_session(&self, session: SessionHandle) {
        if let Err(e) = self.engine.close(session).await {
            warn!(%session, error = %e, "Failed to close engine session");
        }
    }
}

/// Map a flow result onto the tracker and a mode-level failure
fn conclude<T>(tracker: &SessionTracker, result: NodeResult<T>) -> Result<T, SessionFailure> {
    result.map_err(|error| {
        let stage = tracker.fail(&error);
        SessionFailure {
            mode: tracker.mode(),
            stage,
            error,
        }
    })
}

fn parent_or_current(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
