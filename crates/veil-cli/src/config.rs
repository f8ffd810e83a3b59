//! Command line definition and its mapping onto library configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use veil_logging::{FileConfig, LogConfig, LogFormat};
use veil_node::{DEFAULT_ANNOUNCE, HostRequest, NodeConfig, PublishRequest, RetrieveRequest};
use veil_swarm::SwarmConfig;

/// Recipient used when none is given
pub const DEFAULT_RECIPIENT: &str = "user1";

#[derive(Debug, Parser)]
#[command(
    name = "veil",
    version,
    about = "Share content through a swarm behind an encrypted descriptor"
)]
pub struct Cli {
    /// Log filter (trace, debug, info, warn, error or a RUST_LOG directive)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Console log format
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Also write JSON logs to daily files in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Describe a file or directory and seal the descriptor for a recipient
    Publish(PublishArgs),
    /// Serve local content for a plain descriptor until interrupted
    Host(HostArgs),
    /// Open a sealed descriptor and fetch its content
    Retrieve(RetrieveArgs),
}

/// Swarm options shared by host and retrieve
#[derive(Debug, Clone, Args)]
pub struct SwarmArgs {
    /// Rendezvous directory shared with other peers
    #[arg(long, default_value = "./veil-swarm")]
    pub swarm_dir: PathBuf,

    /// Address advertised to other peers
    #[arg(long, default_value = "0.0.0.0:50007")]
    pub listen: SocketAddr,

    /// Peer to contact directly (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<SocketAddr>,
}

impl SwarmArgs {
    pub fn swarm_config(&self) -> SwarmConfig {
        SwarmConfig::new(&self.swarm_dir).with_listen_addr(self.listen)
    }
}

#[derive(Debug, Clone, Args)]
pub struct PublishArgs {
    /// File or directory to share
    pub path: PathBuf,

    /// Directory for the sealed artifact and plain descriptor
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,

    /// Recipient the artifact is sealed for
    #[arg(long, default_value = DEFAULT_RECIPIENT)]
    pub user: String,

    /// Hex-encoded 32-byte key (generated when omitted)
    #[arg(long)]
    pub key: Option<String>,

    /// Coordination endpoint recorded in the descriptor
    #[arg(long, default_value = DEFAULT_ANNOUNCE)]
    pub tracker: String,

    /// Piece length in bytes
    #[arg(long, default_value_t = 262_144)]
    pub piece_length: u64,

    /// Allow public discovery of the content
    #[arg(long)]
    pub public: bool,

    /// Do not write the plain descriptor next to the artifact
    #[arg(long)]
    pub no_plain_descriptor: bool,
}

impl PublishArgs {
    pub fn node_config(&self) -> NodeConfig {
        let announce = (!self.tracker.is_empty()).then(|| self.tracker.clone());
        NodeConfig::default()
            .with_piece_length(self.piece_length)
            .with_announce(announce)
            .with_private(!self.public)
            .with_plain_descriptor(!self.no_plain_descriptor)
    }

    pub fn request(&self) -> PublishRequest {
        PublishRequest {
            source: self.path.clone(),
            output_dir: self.output.clone(),
            recipient_id: self.user.clone(),
            key_hex: self.key.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct HostArgs {
    /// Plain descriptor written by publish
    #[arg(long)]
    pub descriptor: PathBuf,

    /// Directory containing the content (defaults to the descriptor's directory)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(flatten)]
    pub swarm: SwarmArgs,
}

impl HostArgs {
    pub fn request(&self) -> HostRequest {
        HostRequest {
            descriptor_path: self.descriptor.clone(),
            data_dir: self.data_dir.clone(),
            peer_hints: self.swarm.peers.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RetrieveArgs {
    /// Sealed artifact
    pub artifact: PathBuf,

    /// Recipient the artifact was sealed for
    #[arg(long, default_value = DEFAULT_RECIPIENT)]
    pub user: String,

    /// Hex-encoded 32-byte key
    #[arg(long)]
    pub key: String,

    /// Directory receiving the content
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,

    /// Give up when readiness or the transfer takes longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub swarm: SwarmArgs,
}

impl RetrieveArgs {
    pub fn node_config(&self) -> NodeConfig {
        let timeout = self.timeout.map(Duration::from_secs);
        NodeConfig::default()
            .with_readiness_timeout(timeout)
            .with_transfer_timeout(timeout)
    }

    pub fn request(&self) -> RetrieveRequest {
        RetrieveRequest {
            artifact_path: self.artifact.clone(),
            recipient_id: self.user.clone(),
            key_hex: Some(self.key.clone()),
            output_dir: self.output.clone(),
            peer_hints: self.swarm.peers.clone(),
        }
    }
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig {
            default_level: self.log_level.clone(),
            ..LogConfig::default()
        };
        config.console.format = self.log_format;
        config.file = self.log_dir.as_ref().map(FileConfig::in_dir);
        config
    }
}
