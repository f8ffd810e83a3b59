//! # Veil Node
//!
//! Session orchestrator for the Veil pipeline.
//!
//! An [`Orchestrator`] drives three modes over any
//! [`SwarmEngine`](veil_core::SwarmEngine):
//!
//! - **publish**: build a descriptor, seal it for a recipient, write the artifact
//! - **host**: register a plain descriptor and serve local content until cancelled
//! - **retrieve**: open an artifact, register it and fetch the content
//!
//! Each session walks a small state machine ([`SessionState`]) that
//! observers can follow through a [`SessionTracker`]. Waits on the engine are
//! bounded by a [`CancellationToken`](tokio_util::sync::CancellationToken) and
//! optional timeouts from [`NodeConfig`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use veil_node::{NodeConfig, Orchestrator, PublishRequest};
//!
//! let orchestrator = Orchestrator::new(NodeConfig::default(), registry, engine);
//! let receipt = orchestrator
//!     .publish(PublishRequest {
//!         source: "movie.mkv".into(),
//!         output_dir: "out".into(),
//!         recipient_id: "user1".into(),
//!         key_hex: None,
//!     })
//!     .await?;
//! println!("key for {}: {}", receipt.recipient_id, receipt.key_hex());
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod wait;

pub use config::{DEFAULT_ANNOUNCE, NodeConfig};
pub use error::{ErrorKind, Mode, NodeError, NodeResult, SessionFailure};
pub use orchestrator::{
    ARTIFACT_EXTENSION, DESCRIPTOR_EXTENSION, HostReport, HostRequest, Orchestrator,
    PublishReceipt, PublishRequest, RetrieveReport, RetrieveRequest,
};
pub use state::{SessionState, SessionTracker, Stage};
