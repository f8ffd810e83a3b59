//! Configuration for the session orchestrator

use std::time::Duration;

use veil_core::DEFAULT_PIECE_LENGTH;

/// Coordination endpoint written into new descriptors by default
pub const DEFAULT_ANNOUNCE: &str = "udp://tracker.opentrackr.org:1337/announce";

/// Configuration for an [`Orchestrator`](crate::Orchestrator)
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Piece length for new descriptors
    pub piece_length: u64,
    /// Coordination endpoint for new descriptors
    pub announce: Option<String>,
    /// Producer string for new descriptors
    pub created_by: String,
    /// Whether new descriptors are private
    pub private: bool,
    /// Interval between progress polls
    pub poll_interval: Duration,
    /// Bound on the wait for engine readiness (None waits indefinitely)
    pub readiness_timeout: Option<Duration>,
    /// Bound on the wait for transfer completion (None waits indefinitely)
    pub transfer_timeout: Option<Duration>,
    /// Pause after completion so the engine can flush
    pub completion_linger: Duration,
    /// Also write the unencrypted descriptor next to the artifact
    pub write_plain_descriptor: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            piece_length: DEFAULT_PIECE_LENGTH,
            announce: Some(DEFAULT_ANNOUNCE.to_string()),
            created_by: format!("veil {}", env!("CARGO_PKG_VERSION")),
            private: true,
            poll_interval: Duration::from_secs(2),
            readiness_timeout: None,
            transfer_timeout: None,
            completion_linger: Duration::from_secs(3),
            write_plain_descriptor: true,
        }
    }
}

impl NodeConfig {
    /// Set the piece length for new descriptors
    pub fn with_piece_length(mut self, piece_length: u64) -> Self {
        self.piece_length = piece_length;
        self
    }

    /// Set the coordination endpoint for new descriptors
    pub fn with_announce(mut self, announce: Option<String>) -> Self {
        self.announce = announce;
        self
    }

    /// Set the producer string
    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Mark new descriptors private or public
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Set the progress poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound the readiness wait
    pub fn with_readiness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Bound the transfer wait
    pub fn with_transfer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Set the post-completion linger
    pub fn with_completion_linger(mut self, linger: Duration) -> Self {
        self.completion_linger = linger;
        self
    }

    /// Enable or disable writing the plain descriptor on publish
    pub fn with_plain_descriptor(mut self, enabled: bool) -> Self {
        self.write_plain_descriptor = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.piece_length, 262_144);
        assert_eq!(config.announce.as_deref(), Some(DEFAULT_ANNOUNCE));
        assert!(config.created_by.starts_with("veil "));
        assert!(config.private);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(config.readiness_timeout.is_none());
        assert!(config.transfer_timeout.is_none());
        assert_eq!(config.completion_linger, Duration::from_secs(3));
        assert!(config.write_plain_descriptor);
    }

    #[test]
    fn test_builders() {
        let config = NodeConfig::default()
            .with_piece_length(16_384)
            .with_announce(None)
            .with_private(false)
            .with_poll_interval(Duration::from_millis(50))
            .with_readiness_timeout(Some(Duration::from_secs(1)))
            .with_transfer_timeout(Some(Duration::from_secs(5)))
            .with_completion_linger(Duration::ZERO)
            .with_plain_descriptor(false);

        assert_eq!(config.piece_length, 16_384);
        assert!(config.announce.is_none());
        assert!(!config.private);
        assert_eq!(config.readiness_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.completion_linger, Duration::ZERO);
        assert!(!config.write_plain_descriptor);
    }
}
