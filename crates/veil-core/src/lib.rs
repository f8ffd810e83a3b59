//! # Veil Core
//!
//! Core types for the Veil encrypted-descriptor distribution pipeline.
//!
//! This crate holds the pieces every other Veil crate agrees on: the
//! content descriptor that encrypted artifacts carry, its canonical wire
//! encoding, and the capability interface behind which a peer-to-peer
//! swarm engine lives.
//!
//! ## Key Types
//!
//! - [`ContentDescriptor`]: Piece map and file layout of shared content
//! - [`PieceHash`]: BLAKE3 digest of a single piece
//! - [`SwarmEngine`]: Capability interface to an external swarm engine
//! - [`MockEngine`]: In-memory engine for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use veil_core::{codec, ContentDescriptor};
//!
//! let bytes = codec::encode(&descriptor);
//! let decoded = codec::decode(&bytes)?;
//! assert_eq!(decoded, descriptor);
//! ```

pub mod codec;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod mock_engine;

// Re-export main types
pub use codec::{decode, encode};
pub use descriptor::{
    ContentDescriptor, ContentId, DEFAULT_PIECE_LENGTH, FileEntry, PIECE_HASH_SIZE, PieceHash,
    piece_count_for,
};
pub use engine::{SessionHandle, SwarmEngine, TransferProgress};
pub use error::{CodecError, CodecResult, EngineError, EngineResult};
pub use mock_engine::{EngineCall, MockBehavior, MockEngine};
