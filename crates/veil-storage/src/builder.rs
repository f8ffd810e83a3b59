//! Descriptor builder
//!
//! Walks a file or directory tree and produces a [`ContentDescriptor`]:
//! entries in lexicographic path order and one BLAKE3 hash per
//! `piece_length` window of the concatenated content stream.
//!
//! Building is synchronous, blocking I/O; async callers should run it on
//! `tokio::task::spawn_blocking`.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use veil_core::{ContentDescriptor, DEFAULT_PIECE_LENGTH, FileEntry, PieceHash};

use crate::error::{StorageError, StorageResult};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Build a descriptor with default provenance settings
pub fn build_descriptor(source: &Path, piece_length: u64) -> StorageResult<ContentDescriptor> {
    DescriptorBuilder::new(piece_length).build(source)
}

/// Configurable descriptor builder
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    piece_length: u64,
    private: bool,
    created_by: String,
    announce: Option<String>,
    creation_time: Option<i64>,
}

impl Default for DescriptorBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PIECE_LENGTH)
    }
}

impl DescriptorBuilder {
    /// Create a builder for the given piece length
    pub fn new(piece_length: u64) -> Self {
        Self {
            piece_length,
            private: true,
            created_by: format!("veil {}", env!("CARGO_PKG_VERSION")),
            announce: None,
            creation_time: None,
        }
    }

    /// Set the swarm coordination endpoint
    pub fn announce(mut self, announce: Option<String>) -> Self {
        self.announce = announce;
        self
    }

    /// Set the producer string
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Mark the descriptor private (not for public discovery)
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Pin the creation time instead of using the current time
    pub fn creation_time(mut self, unix_seconds: i64) -> Self {
        self.creation_time = Some(unix_seconds);
        self
    }

    /// Build a descriptor for `source`
    #[instrument(skip(self), fields(source = %source.display(), piece_length = self.piece_length))]
    pub fn build(&self, source: &Path) -> StorageResult<ContentDescriptor> {
        if self.piece_length == 0 {
            return Err(StorageError::InvalidPieceLength(self.piece_length));
        }

        let source = fs::canonicalize(source).map_err(|e| StorageError::io_at(source, e))?;
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                StorageError::InvalidSource(format!("{} has no usable name", source.display()))
            })?;

        let metadata = fs::metadata(&source).map_err(|e| StorageError::io_at(&source, e))?;

        let files: Vec<(FileEntry, PathBuf)> = if metadata.is_file() {
            vec![(FileEntry::single(metadata.len()), source.clone())]
        } else if metadata.is_dir() {
            let mut files = Vec::new();
            walk_directory(&source, &mut Vec::new(), &mut files)?;
            files
        } else {
            return Err(StorageError::InvalidSource(format!(
                "{} is neither a file nor a directory",
                source.display()
            )));
        };

        let piece_hashes = hash_files(&files, self.piece_length)?;

        let descriptor = ContentDescriptor {
            name,
            piece_length: self.piece_length,
            entries: files.into_iter().map(|(entry, _)| entry).collect(),
            piece_hashes,
            private: self.private,
            creation_time: self
                .creation_time
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            created_by: self.created_by.clone(),
            announce: self.announce.clone(),
        };

        info!(
            name = %descriptor.name,
            files = descriptor.entries.len(),
            total_length = descriptor.total_length(),
            pieces = descriptor.piece_count(),
            "Built content descriptor"
        );

        Ok(descriptor)
    }
}

/// Collect regular files under `dir` in lexicographic order
fn walk_directory(
    dir: &Path,
    prefix: &mut Vec<String>,
    out: &mut Vec<(FileEntry, PathBuf)>,
) -> StorageResult<()> {
    let mut children = fs::read_dir(dir)
        .map_err(|e| StorageError::io_at(dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StorageError::io_at(dir, e))?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let path = child.path();
        let file_type = child.file_type().map_err(|e| StorageError::io_at(&path, e))?;

        if file_type.is_symlink() {
            debug!(path = %path.display(), "Skipping symbolic link");
            continue;
        }

        let component = child.file_name().into_string().map_err(|_| {
            StorageError::InvalidSource(format!("{} has a non UTF-8 name", path.display()))
        })?;

        prefix.push(component);
        if file_type.is_dir() {
            walk_directory(&path, prefix, out)?;
        } else if file_type.is_file() {
            let length = child
                .metadata()
                .map_err(|e| StorageError::io_at(&path, e))?
                .len();
            out.push((FileEntry::nested(prefix.clone(), length), path));
        }
        prefix.pop();
    }

    Ok(())
}

/// Hash the concatenated stream of `files`
fn hash_files(files: &[(FileEntry, PathBuf)], piece_length: u64) -> StorageResult<Vec<PieceHash>> {
    let mut hasher = PieceHasher::new(piece_length);
    for (entry, path) in files {
        hash_file(path, entry.length, &mut hasher)?;
    }
    Ok(hasher.finish())
}

/// Stream exactly `length` bytes of `path` into the hasher
fn hash_file(path: &Path, length: u64, hasher: &mut PieceHasher) -> StorageResult<()> {
    let mut file = File::open(path).map_err(|e| StorageError::io_at(path, e))?;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut remaining = length;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match file.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(StorageError::SourceChanged(format!(
                    "{} shrank while hashing",
                    path.display()
                )));
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StorageError::io_at(path, e)),
        };
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    // Anything left means the file grew after it was measured
    let mut probe = [0u8; 1];
    loop {
        match file.read(&mut probe) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                return Err(StorageError::SourceChanged(format!(
                    "{} grew while hashing",
                    path.display()
                )));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StorageError::io_at(path, e)),
        }
    }
}

/// Splits a byte stream into fixed windows and hashes each one
pub struct PieceHasher {
    piece_length: u64,
    current: blake3::Hasher,
    filled: u64,
    hashes: Vec<PieceHash>,
}

impl PieceHasher {
    /// Create a hasher for the given piece length (must be positive)
    pub fn new(piece_length: u64) -> Self {
        Self {
            piece_length,
            current: blake3::Hasher::new(),
            filled: 0,
            hashes: Vec::new(),
        }
    }

    /// Feed the next bytes of the stream
    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let room = (self.piece_length - self.filled).min(data.len() as u64) as usize;
            self.current.update(&data[..room]);
            self.filled += room as u64;
            data = &data[room..];

            if self.filled == self.piece_length {
                self.hashes.push(PieceHash::from_hasher(&self.current));
                self.current.reset();
                self.filled = 0;
            }
        }
    }

    /// Finish the stream and return all piece hashes
    ///
    /// A partial final window is hashed as the last piece; an empty stream
    /// yields the single hash of the empty input.
    pub fn finish(mut self) -> Vec<PieceHash> {
        if self.filled > 0 || self.hashes.is_empty() {
            self.hashes.push(PieceHash::from_hasher(&self.current));
        }
        debug!(pieces = self.hashes.len(), "Finished piece hashing");
        self.hashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_piece_hasher_windows() {
        let data: Vec<u8> = (0..100u8).collect();

        let mut hasher = PieceHasher::new(30);
        // Feed in uneven chunks to cross window boundaries
        hasher.update(&data[..7]);
        hasher.update(&data[7..61]);
        hasher.update(&data[61..]);
        let hashes = hasher.finish();

        let expected: Vec<PieceHash> = data.chunks(30).map(PieceHash::of).collect();
        assert_eq!(hashes, expected);
    }

    #[test]
    fn test_piece_hasher_exact_multiple() {
        let data = vec![5u8; 60];
        let mut hasher = PieceHasher::new(30);
        hasher.update(&data);
        assert_eq!(hasher.finish().len(), 2);
    }

    #[test]
    fn test_piece_hasher_empty_stream() {
        let hashes = PieceHasher::new(30).finish();
        assert_eq!(hashes, vec![PieceHash::of(b"")]);
    }

    #[test]
    fn test_single_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, vec![1u8; 100]).unwrap();

        let d = build_descriptor(&path, 32).unwrap();
        assert_eq!(d.name, "notes.txt");
        assert!(d.is_single_file());
        assert_eq!(d.total_length(), 100);
        assert_eq!(d.piece_count(), 4);
        assert_eq!(d.piece_hashes[3], PieceHash::of(&[1u8; 4]));
        assert!(d.private);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_zero_length_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let d = build_descriptor(&path, 262_144).unwrap();
        assert_eq!(d.total_length(), 0);
        assert_eq!(d.piece_hashes, vec![PieceHash::of(b"")]);
    }

    #[test]
    fn test_directory_order_and_stream() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("album");
        fs::create_dir_all(root.join("b_dir")).unwrap();
        fs::create_dir_all(root.join("empty_dir")).unwrap();
        fs::write(root.join("c.txt"), b"CCCC").unwrap();
        fs::write(root.join("a.txt"), b"AA").unwrap();
        fs::write(root.join("b_dir").join("inner.txt"), b"BBB").unwrap();

        let d = build_descriptor(&root, 4).unwrap();
        let paths: Vec<String> = d.entries.iter().map(|e| e.display_path()).collect();
        assert_eq!(paths, vec!["a.txt", "b_dir/inner.txt", "c.txt"]);

        // Stream is AA BBB CCCC = 9 bytes, windows of 4
        let stream = b"AABBBCCCC";
        let expected: Vec<PieceHash> = stream.chunks(4).map(PieceHash::of).collect();
        assert_eq!(d.piece_hashes, expected);
        assert_eq!(d.name, "album");
    }

    #[test]
    fn test_build_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("tree");
        fs::create_dir_all(root.join("x")).unwrap();
        fs::write(root.join("x").join("1.bin"), vec![9u8; 5000]).unwrap();
        fs::write(root.join("2.bin"), vec![3u8; 777]).unwrap();

        let builder = DescriptorBuilder::new(1024).creation_time(42);
        let first = builder.build(&root).unwrap();
        let second = builder.build(&root).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.piece_hashes, second.piece_hashes);
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let temp = TempDir::new().unwrap();
        let result = build_descriptor(&temp.path().join("missing"), 1024);
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn test_file_removed_after_walk_is_io_error() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("set");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.bin"), vec![1u8; 40]).unwrap();
        fs::write(root.join("b.bin"), vec![2u8; 40]).unwrap();

        let mut files = Vec::new();
        walk_directory(&root, &mut Vec::new(), &mut files).unwrap();
        assert_eq!(files.len(), 2);

        fs::remove_file(root.join("b.bin")).unwrap();
        let result = hash_files(&files, 16);
        assert!(matches!(result, Err(StorageError::Io(msg)) if msg.contains("b.bin")));
    }

    #[test]
    fn test_file_replaced_by_directory_after_walk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("set");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.bin"), vec![1u8; 40]).unwrap();

        let mut files = Vec::new();
        walk_directory(&root, &mut Vec::new(), &mut files).unwrap();

        fs::remove_file(root.join("a.bin")).unwrap();
        fs::create_dir(root.join("a.bin")).unwrap();
        assert!(matches!(hash_files(&files, 16), Err(StorageError::Io(_))));
    }

    #[test]
    fn test_shrunken_file_is_source_changed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f.bin");
        fs::write(&path, vec![7u8; 100]).unwrap();

        let mut hasher = PieceHasher::new(32);
        let result = hash_file(&path, 150, &mut hasher);
        assert!(matches!(result, Err(StorageError::SourceChanged(msg)) if msg.contains("shrank")));
    }

    #[test]
    fn test_grown_file_is_source_changed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f.bin");
        fs::write(&path, vec![7u8; 100]).unwrap();

        let mut hasher = PieceHasher::new(32);
        let result = hash_file(&path, 60, &mut hasher);
        assert!(matches!(result, Err(StorageError::SourceChanged(msg)) if msg.contains("grew")));
    }

    #[test]
    fn test_exact_length_hashes_cleanly() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f.bin");
        fs::write(&path, vec![7u8; 100]).unwrap();

        let mut hasher = PieceHasher::new(32);
        hash_file(&path, 100, &mut hasher).unwrap();
        assert_eq!(hasher.finish().len(), 4);
    }

    #[test]
    fn test_zero_piece_length_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, b"x").unwrap();
        assert!(matches!(
            build_descriptor(&path, 0),
            Err(StorageError::InvalidPieceLength(0))
        ));
    }

    #[test]
    fn test_builder_options() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, b"x").unwrap();

        let d = DescriptorBuilder::new(16)
            .announce(Some("udp://tracker.example:1337/announce".into()))
            .created_by("tester")
            .private(false)
            .creation_time(1_700_000_000)
            .build(&path)
            .unwrap();

        assert_eq!(d.announce.as_deref(), Some("udp://tracker.example:1337/announce"));
        assert_eq!(d.created_by, "tester");
        assert!(!d.private);
        assert_eq!(d.creation_time, 1_700_000_000);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("real.txt"), b"real").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

        let d = build_descriptor(&root, 16).unwrap();
        assert_eq!(d.entries.len(), 1);
        assert_eq!(d.entries[0].display_path(), "real.txt");
    }
}
