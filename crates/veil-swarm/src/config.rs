//! Directory swarm configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default listen port advertised by seeders
pub const DEFAULT_LISTEN_PORT: u16 = 50007;

/// Configuration for a [`DirectorySwarm`](crate::DirectorySwarm)
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Directory shared by every participant, holding seed manifests
    pub rendezvous_dir: PathBuf,
    /// Address advertised in seed manifests
    pub listen_addr: SocketAddr,
    /// How often a fetch task looks for seeders and missing pieces
    pub poll_interval: Duration,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            rendezvous_dir: PathBuf::from("./veil-swarm"),
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT)),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl SwarmConfig {
    /// Create a config using `rendezvous_dir` and defaults otherwise
    pub fn new(rendezvous_dir: impl Into<PathBuf>) -> Self {
        Self {
            rendezvous_dir: rendezvous_dir.into(),
            ..Default::default()
        }
    }

    /// Set the advertised listen address
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Set the fetch poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
