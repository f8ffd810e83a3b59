//! # Veil Storage
//!
//! Local storage for the Veil pipeline.
//!
//! ## Features
//!
//! - **DescriptorBuilder**: Walks a file or directory and hashes it into a
//!   [`ContentDescriptor`](veil_core::ContentDescriptor)
//! - **ContentLayout**: Reads, writes and verifies pieces of content on disk
//! - **write_atomic**: Temp file, `fsync`, rename; readers never see a
//!   partial artifact
//!
//! ## Example
//!
//! ```rust,ignore
//! use veil_storage::{build_descriptor, ContentLayout};
//!
//! let descriptor = build_descriptor(Path::new("movie.mkv"), 262_144)?;
//! let layout = ContentLayout::new(descriptor, ".");
//! assert!(layout.verify_all()?.iter().all(|ok| *ok));
//! ```

pub mod atomic;
pub mod builder;
pub mod error;
pub mod layout;

// Re-exports
pub use atomic::write_atomic;
pub use builder::{DescriptorBuilder, PieceHasher, build_descriptor};
pub use error::{StorageError, StorageResult};
pub use layout::ContentLayout;
