//! On-disk piece layout
//!
//! Maps the piece space of a [`ContentDescriptor`] onto the files under a
//! data directory. Single-file content lives at `data_dir/<name>`; directory
//! content lives under `data_dir/<name>/<entry path>`.
//!
//! All I/O here is blocking; async callers wrap it in `spawn_blocking`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, trace};
use veil_core::{ContentDescriptor, PieceHash};

use crate::error::{StorageError, StorageResult};

/// A file's position in the content stream
#[derive(Debug, Clone)]
struct FileSpan {
    path: PathBuf,
    offset: u64,
    length: u64,
}

impl FileSpan {
    fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Piece-addressed view of content stored under a data directory
#[derive(Debug, Clone)]
pub struct ContentLayout {
    descriptor: ContentDescriptor,
    content_root: PathBuf,
    spans: Vec<FileSpan>,
}

impl ContentLayout {
    /// Lay out `descriptor` under `data_dir`
    pub fn new(descriptor: ContentDescriptor, data_dir: impl AsRef<Path>) -> Self {
        let content_root = data_dir.as_ref().join(&descriptor.name);

        let mut offset = 0u64;
        let spans = descriptor
            .entries
            .iter()
            .map(|entry| {
                let path = if entry.path.is_empty() {
                    content_root.clone()
                } else {
                    content_root.join(entry.relative_path())
                };
                let span = FileSpan {
                    path,
                    offset,
                    length: entry.length,
                };
                offset += entry.length;
                span
            })
            .collect();

        Self {
            descriptor,
            content_root,
            spans,
        }
    }

    /// The descriptor this layout serves
    pub fn descriptor(&self) -> &ContentDescriptor {
        &self.descriptor
    }

    /// Path of the content (the file itself for single-file content)
    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Paths of every file, in stream order
    pub fn file_paths(&self) -> impl Iterator<Item = &Path> {
        self.spans.iter().map(|s| s.path.as_path())
    }

    fn piece_range(&self, index: usize) -> StorageResult<(u64, u64)> {
        let size = self.descriptor.piece_size(index).ok_or_else(|| {
            StorageError::layout(format!(
                "piece {} out of range ({} pieces)",
                index,
                self.descriptor.piece_count()
            ))
        })?;
        let start = self.descriptor.piece_offset(index);
        Ok((start, start + size))
    }

    /// Piece that accounts for a zero-length file at `offset`
    fn owning_piece(&self, offset: u64) -> usize {
        let last = self.descriptor.piece_count().saturating_sub(1);
        ((offset / self.descriptor.piece_length) as usize).min(last)
    }

    /// Spans touched by piece `index`, with zero-length files assigned to
    /// the piece containing their offset
    fn spans_for(&self, index: usize, start: u64, end: u64) -> impl Iterator<Item = &FileSpan> {
        self.spans.iter().filter(move |span| {
            if span.length == 0 {
                self.owning_piece(span.offset) == index
            } else {
                span.offset < end && span.end() > start
            }
        })
    }

    /// Read piece `index` from disk
    pub fn read_piece(&self, index: usize) -> StorageResult<Vec<u8>> {
        let (start, end) = self.piece_range(index)?;
        let mut data = Vec::with_capacity((end - start) as usize);

        for span in self.spans_for(index, start, end) {
            let mut file = File::open(&span.path).map_err(|e| StorageError::io_at(&span.path, e))?;
            if span.length == 0 {
                continue;
            }

            let from = start.max(span.offset);
            let to = end.min(span.end());
            file.seek(SeekFrom::Start(from - span.offset))
                .map_err(|e| StorageError::io_at(&span.path, e))?;

            let begin = data.len();
            data.resize(begin + (to - from) as usize, 0);
            file.read_exact(&mut data[begin..])
                .map_err(|e| StorageError::io_at(&span.path, e))?;
        }

        Ok(data)
    }

    /// Check piece `index` on disk against its descriptor hash
    ///
    /// Missing or short files count as an unverified piece, not an error.
    pub fn verify_piece(&self, index: usize) -> StorageResult<bool> {
        let expected = *self
            .descriptor
            .piece_hash(index)
            .ok_or_else(|| StorageError::layout(format!("piece {} out of range", index)))?;

        match self.read_piece(index) {
            Ok(data) => Ok(PieceHash::of(&data) == expected),
            Err(StorageError::Io(msg)) if self.is_absent(index) => {
                trace!(index, reason = %msg, "Piece not present");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether any file backing piece `index` is missing or too short
    fn is_absent(&self, index: usize) -> bool {
        let Ok((start, end)) = self.piece_range(index) else {
            return false;
        };
        self.spans_for(index, start, end).any(|span| match fs::metadata(&span.path) {
            Ok(meta) => meta.len() < end.min(span.end()) - span.offset,
            Err(e) => e.kind() == ErrorKind::NotFound,
        })
    }

    /// Verify every piece, returning one flag per piece
    #[instrument(skip(self), fields(name = %self.descriptor.name, pieces = self.descriptor.piece_count()))]
    pub fn verify_all(&self) -> StorageResult<Vec<bool>> {
        let flags = (0..self.descriptor.piece_count())
            .map(|index| self.verify_piece(index))
            .collect::<StorageResult<Vec<bool>>>()?;

        debug!(
            verified = flags.iter().filter(|v| **v).count(),
            "Verified local content"
        );
        Ok(flags)
    }

    /// Bytes covered by the verified pieces in `flags`
    pub fn verified_bytes(&self, flags: &[bool]) -> u64 {
        flags
            .iter()
            .enumerate()
            .filter(|(_, ok)| **ok)
            .filter_map(|(index, _)| self.descriptor.piece_size(index))
            .sum()
    }

    /// Write piece `index` after checking its length and hash
    ///
    /// Files are created as needed and never truncated.
    pub fn write_piece(&self, index: usize, data: &[u8]) -> StorageResult<()> {
        let (start, end) = self.piece_range(index)?;
        if data.len() as u64 != end - start {
            return Err(StorageError::layout(format!(
                "piece {} is {} bytes, expected {}",
                index,
                data.len(),
                end - start
            )));
        }

        let expected = self.descriptor.piece_hash(index);
        if expected != Some(&PieceHash::of(data)) {
            return Err(StorageError::Integrity { index });
        }

        for span in self.spans_for(index, start, end) {
            if let Some(parent) = span.path.parent() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io_at(parent, e))?;
            }
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&span.path)
                .map_err(|e| StorageError::io_at(&span.path, e))?;
            if span.length == 0 {
                continue;
            }

            let from = start.max(span.offset);
            let to = end.min(span.end());
            file.seek(SeekFrom::Start(from - span.offset))
                .map_err(|e| StorageError::io_at(&span.path, e))?;
            file.write_all(&data[(from - start) as usize..(to - start) as usize])
                .map_err(|e| StorageError::io_at(&span.path, e))?;
        }

        trace!(index, size = data.len(), "Wrote piece");
        Ok(())
    }

    /// Flush every file to stable storage
    pub fn sync_all(&self) -> StorageResult<()> {
        for span in &self.spans {
            match File::open(&span.path) {
                Ok(file) => file.sync_all().map_err(|e| StorageError::io_at(&span.path, e))?,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::io_at(&span.path, e)),
            }
        }
        Ok(())
    }
}
