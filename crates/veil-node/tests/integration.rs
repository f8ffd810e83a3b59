//! Orchestrator sessions against the mock and directory engines

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use veil_core::{EngineCall, MockBehavior, MockEngine};
use veil_crypto::{AccessRegistry, SecretKey, seal};
use veil_node::{
    ErrorKind, HostRequest, Mode, NodeConfig, Orchestrator, PublishReceipt, PublishRequest,
    RetrieveRequest, SessionState, SessionTracker, Stage,
};
use veil_swarm::{DirectorySwarm, SwarmConfig};

fn fast_config() -> NodeConfig {
    NodeConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_completion_linger(Duration::ZERO)
}

fn mock_orchestrator(behavior: MockBehavior) -> (Orchestrator<MockEngine>, Arc<MockEngine>) {
    let engine = Arc::new(MockEngine::with_behavior(behavior));
    let orchestrator = Orchestrator::new(
        fast_config(),
        Arc::new(AccessRegistry::new()),
        Arc::clone(&engine),
    );
    (orchestrator, engine)
}

fn write_source(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    fs::write(&path, data).unwrap();
    path
}

fn publish_request(source: &Path, output: &Path, key_hex: Option<String>) -> PublishRequest {
    PublishRequest {
        source: source.to_path_buf(),
        output_dir: output.to_path_buf(),
        recipient_id: "user1".to_string(),
        key_hex,
    }
}

fn retrieve_request(receipt: &PublishReceipt, output: &Path, key_hex: Option<String>) -> RetrieveRequest {
    RetrieveRequest {
        artifact_path: receipt.artifact_path.clone(),
        recipient_id: "user1".to_string(),
        key_hex,
        output_dir: output.to_path_buf(),
        peer_hints: Vec::new(),
    }
}

#[tokio::test]
async fn test_publish_and_retrieve_one_megabyte() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "video.bin", 1_000_000);
    let out = temp.path().join("out");
    let (orchestrator, engine) = mock_orchestrator(MockBehavior::default());

    let publish_tracker = SessionTracker::new(Mode::Publish);
    let receipt = orchestrator
        .publish_tracked(publish_request(&source, &out, None), &publish_tracker)
        .await
        .unwrap();

    assert_eq!(receipt.piece_count, 4);
    assert_eq!(receipt.total_length, 1_000_000);
    assert_eq!(receipt.artifact_path, out.join("video.bin.veil.sealed"));
    assert_eq!(receipt.descriptor_path, Some(out.join("video.bin.veil")));
    assert!(receipt.artifact_path.exists());
    assert_eq!(receipt.key_hex().len(), 64);
    assert_eq!(
        publish_tracker.history(),
        vec![
            SessionState::Idle,
            SessionState::Building,
            SessionState::Encrypting,
            SessionState::Published,
        ]
    );

    let fetch = temp.path().join("fetch");
    let tracker = SessionTracker::new(Mode::Retrieve);
    let report = orchestrator
        .retrieve_tracked(
            retrieve_request(&receipt, &fetch, Some(receipt.key_hex())),
            CancellationToken::new(),
            &tracker,
        )
        .await
        .unwrap();

    assert_eq!(report.descriptor.piece_count(), 4);
    assert_eq!(report.descriptor.total_length(), 1_000_000);
    assert_eq!(report.descriptor.piece_size(3), Some(213_312));
    assert_eq!(report.content_id, receipt.content_id);
    assert_eq!(report.content_path, fetch.join("video.bin"));
    assert!(report.progress.is_complete);
    assert_eq!(
        tracker.history(),
        vec![
            SessionState::Idle,
            SessionState::Decrypting,
            SessionState::Registering,
            SessionState::AwaitingReadiness,
            SessionState::Transferring,
            SessionState::Complete,
        ]
    );

    let calls = engine.calls();
    assert!(matches!(&calls[0], EngineCall::Register { name, data_dir } if name == "video.bin" && *data_dir == fetch));
    assert!(matches!(calls[1], EngineCall::AwaitReady(_)));
    assert!(matches!(calls[2], EngineCall::BeginTransfer(_)));
    assert!(matches!(calls[3], EngineCall::QueryProgress(_)));
    assert!(matches!(calls.last(), Some(EngineCall::Close(_))));
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test]
async fn test_wrong_key_fails_closed() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "video.bin", 1_000_000);
    let (orchestrator, engine) = mock_orchestrator(MockBehavior::default());
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let wrong = SecretKey::generate().to_hex();
    let tracker = SessionTracker::new(Mode::Retrieve);
    let failure = orchestrator
        .retrieve_tracked(
            retrieve_request(&receipt, &temp.path().join("fetch"), Some(wrong.clone())),
            CancellationToken::new(),
            &tracker,
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Authentication);
    assert_eq!(failure.stage, Stage::Decrypting);
    assert!(!failure.to_string().contains(&wrong));
    assert!(matches!(
        tracker.state(),
        SessionState::Failed { stage: Stage::Decrypting, .. }
    ));
    // Nothing reached the engine
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_key_and_malformed_artifact() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 10);
    let (orchestrator, _engine) = mock_orchestrator(MockBehavior::default());
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let failure = orchestrator
        .retrieve(
            retrieve_request(&receipt, temp.path(), Some("abcd".into())),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::InvalidKey);

    let short = temp.path().join("short.veil.sealed");
    fs::write(&short, [1u8, 2, 3]).unwrap();
    let mut request = retrieve_request(&receipt, temp.path(), Some(receipt.key_hex()));
    request.artifact_path = short;
    let failure = orchestrator
        .retrieve(request, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::MalformedArtifact);
}

#[tokio::test]
async fn test_authentic_garbage_is_decode_error() {
    let temp = TempDir::new().unwrap();
    let key = SecretKey::generate();
    let artifact = temp.path().join("bogus.veil.sealed");
    fs::write(&artifact, seal(b"not a descriptor", &key).unwrap().to_bytes()).unwrap();

    let (orchestrator, engine) = mock_orchestrator(MockBehavior::default());
    let failure = orchestrator
        .retrieve(
            RetrieveRequest {
                artifact_path: artifact,
                recipient_id: "user1".into(),
                key_hex: Some(key.to_hex()),
                output_dir: temp.path().to_path_buf(),
                peer_hints: Vec::new(),
            },
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Decode);
    assert_eq!(failure.stage, Stage::Decrypting);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_retrieve_uses_registry_grant() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 5000);
    let (orchestrator, _engine) = mock_orchestrator(MockBehavior::default());
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let report = orchestrator
        .retrieve(
            retrieve_request(&receipt, &temp.path().join("fetch"), None),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.descriptor.total_length(), 5000);

    let mut stranger = retrieve_request(&receipt, temp.path(), None);
    stranger.recipient_id = "user2".into();
    let failure = orchestrator
        .retrieve(stranger, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_grant_reuse_and_conflict() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let (orchestrator, _engine) = mock_orchestrator(MockBehavior::default());

    let key = SecretKey::generate().to_hex();
    let first = orchestrator
        .publish(publish_request(&source, temp.path(), Some(key.clone())))
        .await
        .unwrap();
    assert_eq!(first.key_hex(), key);

    // Same key again is idempotent; no key reuses the existing grant
    let again = orchestrator
        .publish(publish_request(&source, temp.path(), Some(key.clone())))
        .await
        .unwrap();
    assert_eq!(again.key_hex(), key);
    let reused = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();
    assert_eq!(reused.key_hex(), key);
    assert_eq!(reused.generation, 1);

    let failure = orchestrator
        .publish(publish_request(
            &source,
            temp.path(),
            Some(SecretKey::generate().to_hex()),
        ))
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::GrantConflict);
    assert_eq!(failure.stage, Stage::Encrypting);
}

#[tokio::test]
async fn test_publish_missing_source() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, _engine) = mock_orchestrator(MockBehavior::default());

    let failure = orchestrator
        .publish(publish_request(&temp.path().join("missing"), temp.path(), None))
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Io);
    assert_eq!(failure.stage, Stage::Building);
    assert_eq!(failure.mode, Mode::Publish);
    assert!(orchestrator.registry().is_empty());
}

#[tokio::test]
async fn test_publish_without_plain_descriptor() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let out = temp.path().join("out");
    let orchestrator = Orchestrator::new(
        fast_config().with_plain_descriptor(false),
        Arc::new(AccessRegistry::new()),
        Arc::new(MockEngine::new()),
    );

    let receipt = orchestrator
        .publish(publish_request(&source, &out, None))
        .await
        .unwrap();
    assert!(receipt.descriptor_path.is_none());
    assert!(!out.join("doc.txt.veil").exists());
}

#[tokio::test]
async fn test_readiness_timeout() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let engine = Arc::new(MockEngine::with_behavior(MockBehavior {
        ready_immediately: false,
        ..Default::default()
    }));
    let orchestrator = Orchestrator::new(
        fast_config().with_readiness_timeout(Some(Duration::from_millis(50))),
        Arc::new(AccessRegistry::new()),
        Arc::clone(&engine),
    );
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let failure = orchestrator
        .retrieve(
            retrieve_request(&receipt, &temp.path().join("fetch"), None),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::TimedOut);
    assert_eq!(failure.stage, Stage::AwaitingReadiness);
    assert!(matches!(engine.calls().last(), Some(EngineCall::Close(_))));
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test]
async fn test_cancellation_while_waiting() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let (orchestrator, engine) = mock_orchestrator(MockBehavior {
        ready_immediately: false,
        ..Default::default()
    });
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let failure = orchestrator
        .retrieve(retrieve_request(&receipt, &temp.path().join("fetch"), None), token)
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Cancelled);
    assert_eq!(failure.stage, Stage::AwaitingReadiness);
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test]
async fn test_engine_failure_during_transfer() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 1000);
    let (orchestrator, engine) = mock_orchestrator(MockBehavior {
        bytes_per_poll: 100,
        fail_progress_after: Some(2),
        ..Default::default()
    });
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let failure = orchestrator
        .retrieve(
            retrieve_request(&receipt, &temp.path().join("fetch"), None),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.kind(), ErrorKind::Engine);
    assert_eq!(failure.stage, Stage::Transferring);
    assert!(failure.to_string().starts_with("retrieve failed during transferring"));
    assert!(matches!(engine.calls().last(), Some(EngineCall::Close(_))));
}

#[tokio::test]
async fn test_register_rejection() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let (orchestrator, engine) = mock_orchestrator(MockBehavior {
        fail_register: Some("descriptor too large".into()),
        ..Default::default()
    });
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let failure = orchestrator
        .retrieve(
            retrieve_request(&receipt, &temp.path().join("fetch"), None),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Engine);
    assert_eq!(failure.stage, Stage::Registering);
    // No session was opened, so nothing to close
    assert!(!engine.calls().iter().any(|c| matches!(c, EngineCall::Close(_))));
}

#[tokio::test]
async fn test_peer_hints_forwarded() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let (orchestrator, engine) = mock_orchestrator(MockBehavior::default());
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let hints: Vec<SocketAddr> = vec![
        "192.0.2.10:50007".parse().unwrap(),
        "[2001:db8::1]:50007".parse().unwrap(),
    ];
    let mut request = retrieve_request(&receipt, &temp.path().join("fetch"), None);
    request.peer_hints = hints.clone();
    orchestrator
        .retrieve(request, CancellationToken::new())
        .await
        .unwrap();

    let forwarded: Vec<SocketAddr> = engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::PeerHint(_, addr) => Some(addr),
            _ => None,
        })
        .collect();
    assert_eq!(forwarded, hints);
}

#[tokio::test]
async fn test_host_runs_until_cancelled() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let (orchestrator, engine) = mock_orchestrator(MockBehavior {
        content_present: true,
        ..Default::default()
    });
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        canceller.cancel();
    });

    let tracker = SessionTracker::new(Mode::Host);
    let report = orchestrator
        .host_tracked(
            HostRequest {
                descriptor_path: receipt.descriptor_path.clone().unwrap(),
                data_dir: None,
                peer_hints: Vec::new(),
            },
            token,
            &tracker,
        )
        .await
        .unwrap();

    assert_eq!(report.name, "doc.txt");
    assert_eq!(report.data_dir, temp.path());
    assert!(report.progress.is_complete);
    assert_eq!(tracker.state(), SessionState::Complete);
    assert!(matches!(
        &engine.calls()[0],
        EngineCall::Register { data_dir, .. } if data_dir == temp.path()
    ));
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test]
async fn test_host_rejects_sealed_artifact() {
    let temp = TempDir::new().unwrap();
    let source = write_source(temp.path(), "doc.txt", 100);
    let (orchestrator, _engine) = mock_orchestrator(MockBehavior::default());
    let receipt = orchestrator
        .publish(publish_request(&source, temp.path(), None))
        .await
        .unwrap();

    let failure = orchestrator
        .host(
            HostRequest {
                descriptor_path: receipt.artifact_path.clone(),
                data_dir: None,
                peer_hints: Vec::new(),
            },
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::Decode);
    assert_eq!(failure.mode, Mode::Host);
}

#[tokio::test]
async fn test_host_and_retrieve_through_directory_swarm() {
    let rendezvous = TempDir::new().unwrap();
    let seed_dir = TempDir::new().unwrap();
    let fetch_dir = TempDir::new().unwrap();
    let source = write_source(seed_dir.path(), "archive.bin", 700_000);

    let swarm_config = SwarmConfig::new(rendezvous.path()).with_poll_interval(Duration::from_millis(10));
    let registry = Arc::new(AccessRegistry::new());
    let seeder = Arc::new(Orchestrator::new(
        fast_config().with_piece_length(65_536),
        Arc::clone(&registry),
        Arc::new(DirectorySwarm::new(swarm_config.clone())),
    ));
    let fetcher = Orchestrator::new(
        fast_config().with_transfer_timeout(Some(Duration::from_secs(20))),
        Arc::clone(&registry),
        Arc::new(DirectorySwarm::new(swarm_config)),
    );

    let receipt = seeder
        .publish(publish_request(&source, seed_dir.path(), None))
        .await
        .unwrap();
    assert_eq!(receipt.piece_count, 11);

    let host_token = CancellationToken::new();
    let host = {
        let seeder = Arc::clone(&seeder);
        let token = host_token.clone();
        let descriptor_path = receipt.descriptor_path.clone().unwrap();
        tokio::spawn(async move {
            seeder
                .host(
                    HostRequest {
                        descriptor_path,
                        data_dir: None,
                        peer_hints: Vec::new(),
                    },
                    token,
                )
                .await
        })
    };

    let report = fetcher
        .retrieve(
            retrieve_request(&receipt, fetch_dir.path(), Some(receipt.key_hex())),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.progress.bytes_transferred, 700_000);
    assert_eq!(
        fs::read(fetch_dir.path().join("archive.bin")).unwrap(),
        fs::read(&source).unwrap()
    );

    host_token.cancel();
    let host_report = host.await.unwrap().unwrap();
    assert!(host_report.progress.is_complete);
    assert_eq!(host_report.content_id, receipt.content_id);
}
