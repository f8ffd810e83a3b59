//! Atomic file writes
//!
//! Content is written to a temporary file next to the destination, synced,
//! then renamed over it. A concurrent reader sees either the previous file
//! or the complete new one, never a partial write.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::error::{StorageError, StorageResult};

/// Write `data` to `path` atomically, creating parent directories
#[instrument(skip(data), fields(path = %path.display(), size = data.len()))]
pub async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&parent)
        .await
        .map_err(|e| StorageError::io_at(&parent, e))?;

    let temp_path = temp_path_for(path, &parent)?;

    if let Err(e) = write_and_sync(&temp_path, data).await {
        discard(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        discard(&temp_path).await;
        return Err(StorageError::io_at(path, e));
    }

    debug!("Wrote file atomically");
    Ok(())
}

fn temp_path_for(path: &Path, parent: &Path) -> StorageResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::Io(format!("{}: not a file path", path.display())))?;

    // Unique per writer so concurrent writers never share a temp file
    let suffix: u32 = rand::random();
    Ok(parent.join(format!(
        ".{}.{:08x}.tmp",
        file_name.to_string_lossy(),
        suffix
    )))
}

async fn write_and_sync(temp_path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = File::create(temp_path)
        .await
        .map_err(|e| StorageError::io_at(temp_path, e))?;

    file.write_all(data)
        .await
        .map_err(|e| StorageError::io_at(temp_path, e))?;

    file.sync_all()
        .await
        .map_err(|e| StorageError::io_at(temp_path, e))?;

    Ok(())
}

async fn discard(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
    }
}
