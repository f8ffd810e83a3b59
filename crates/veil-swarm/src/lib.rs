//! # Veil Swarm
//!
//! A filesystem rendezvous implementation of
//! [`SwarmEngine`](veil_core::SwarmEngine).
//!
//! Participants share one rendezvous directory. Sessions holding complete,
//! verified content publish a seed manifest there; sessions missing pieces
//! find the manifest, copy pieces from the seeder's data directory and
//! verify every piece against the descriptor before writing it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use veil_swarm::{DirectorySwarm, SwarmConfig};
//!
//! let engine = DirectorySwarm::new(SwarmConfig::new("/mnt/shared/veil-swarm"));
//! let session = engine.register_descriptor(&descriptor, data_dir).await?;
//! engine.await_metadata_ready(session).await?;
//! engine.begin_full_transfer(session).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;

// Re-exports
pub use config::{DEFAULT_LISTEN_PORT, SwarmConfig};
pub use engine::DirectorySwarm;
pub use error::{SwarmError, SwarmResult};
pub use manifest::SeedManifest;
