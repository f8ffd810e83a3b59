//! Content descriptor data model
//!
//! A [`ContentDescriptor`] describes shared content the way a torrent file
//! does: a display name, the ordered list of files, a fixed piece length and
//! one integrity hash per piece of the concatenated byte stream.
//!
//! Layout forms:
//!
//! - Single file: exactly one [`FileEntry`] with an empty `path`; the content
//!   lives at `<data_dir>/<name>`.
//! - Directory: zero or more entries with non-empty relative paths; the
//!   content lives at `<data_dir>/<name>/<path..>`.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::CodecError;

/// Default piece length (256 KiB)
pub const DEFAULT_PIECE_LENGTH: u64 = 256 * 1024;

/// Size of a piece hash in bytes (BLAKE3)
pub const PIECE_HASH_SIZE: usize = 32;

/// Number of pieces needed for a stream of `total_length` bytes
///
/// A zero-length stream still has one (empty) piece.
pub fn piece_count_for(total_length: u64, piece_length: u64) -> u64 {
    if total_length == 0 || piece_length == 0 {
        1
    } else {
        total_length.div_ceil(piece_length)
    }
}

/// BLAKE3 digest of one piece
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PieceHash(pub [u8; PIECE_HASH_SIZE]);

impl PieceHash {
    /// Hash a piece of content
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Wrap a finished BLAKE3 hasher
    pub fn from_hasher(hasher: &blake3::Hasher) -> Self {
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; PIECE_HASH_SIZE] {
        &self.0
    }

    /// Get the digest as a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for logs (first 8 hex chars)
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for PieceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PieceHash({})", self.short_hex())
    }
}

/// Stable identifier of a descriptor
///
/// BLAKE3 of the canonical encoding; engines use it as the swarm key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(pub [u8; 32]);

impl ContentId {
    /// Get the id as a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for logs (first 8 hex chars)
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short_hex())
    }
}

/// One file in the content stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative path components (empty for single-file content)
    pub path: Vec<String>,
    /// File length in bytes
    pub length: u64,
}

impl FileEntry {
    /// Entry for single-file content
    pub fn single(length: u64) -> Self {
        Self {
            path: Vec::new(),
            length,
        }
    }

    /// Entry for a file inside a directory tree
    pub fn nested(path: Vec<String>, length: u64) -> Self {
        Self { path, length }
    }

    /// The relative path as a filesystem path
    pub fn relative_path(&self) -> PathBuf {
        self.path.iter().collect()
    }

    /// Display form of the path, `/`-separated
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

/// Canonical description of shared content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    /// Display name of the content (base name of the source)
    pub name: String,
    /// Piece length in bytes
    pub piece_length: u64,
    /// Files in stream order
    pub entries: Vec<FileEntry>,
    /// One hash per piece, in stream order
    pub piece_hashes: Vec<PieceHash>,
    /// Must not be advertised on public discovery
    pub private: bool,
    /// Creation time (unix seconds)
    pub creation_time: i64,
    /// Producer of the descriptor
    pub created_by: String,
    /// Optional swarm coordination endpoint
    pub announce: Option<String>,
}

impl ContentDescriptor {
    /// Total length of the content stream in bytes
    pub fn total_length(&self) -> u64 {
        self.entries.iter().map(|e| e.length).sum()
    }

    /// Number of pieces
    pub fn piece_count(&self) -> usize {
        self.piece_hashes.len()
    }

    /// Whether this is the single-file layout
    pub fn is_single_file(&self) -> bool {
        self.entries.len() == 1 && self.entries[0].path.is_empty()
    }

    /// Length of piece `index`, or `None` if out of range
    pub fn piece_size(&self, index: usize) -> Option<u64> {
        let count = self.piece_count();
        if index >= count {
            return None;
        }
        let start = index as u64 * self.piece_length;
        Some(self.total_length().saturating_sub(start).min(self.piece_length))
    }

    /// Byte offset of piece `index` in the content stream
    pub fn piece_offset(&self, index: usize) -> u64 {
        index as u64 * self.piece_length
    }

    /// Expected hash of piece `index`
    pub fn piece_hash(&self, index: usize) -> Option<&PieceHash> {
        self.piece_hashes.get(index)
    }

    /// Identifier derived from the canonical encoding
    pub fn content_id(&self) -> ContentId {
        ContentId(*blake3::hash(&codec::encode(self)).as_bytes())
    }

    /// Check the structural invariants of the descriptor
    ///
    /// - piece length is positive
    /// - piece count matches the total length
    /// - entry paths are relative, clean and unique
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.name.is_empty() || !is_clean_component(&self.name) {
            return Err(CodecError::Invalid(format!(
                "invalid content name {:?}",
                self.name
            )));
        }

        if self.piece_length == 0 {
            return Err(CodecError::Invalid("piece length must be positive".into()));
        }

        let total = self
            .entries
            .iter()
            .try_fold(0u64, |acc, e| acc.checked_add(e.length))
            .ok_or_else(|| CodecError::Invalid("total length overflows u64".into()))?;

        let expected = piece_count_for(total, self.piece_length);
        if self.piece_hashes.len() as u64 != expected {
            return Err(CodecError::Invalid(format!(
                "piece count mismatch: {} hashes for {} bytes at piece length {} (expected {})",
                self.piece_hashes.len(),
                total,
                self.piece_length,
                expected
            )));
        }

        let single = self.entries.len() == 1 && self.entries[0].path.is_empty();
        if !single {
            let mut seen = HashSet::with_capacity(self.entries.len());
            for entry in &self.entries {
                if entry.path.is_empty() {
                    return Err(CodecError::Invalid(
                        "empty entry path outside single-file layout".into(),
                    ));
                }
                if let Some(bad) = entry.path.iter().find(|c| !is_clean_component(c)) {
                    return Err(CodecError::Invalid(format!(
                        "invalid path component {:?} in {}",
                        bad,
                        entry.display_path()
                    )));
                }
                if !seen.insert(&entry.path) {
                    return Err(CodecError::Invalid(format!(
                        "duplicate entry {}",
                        entry.display_path()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn is_clean_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}
