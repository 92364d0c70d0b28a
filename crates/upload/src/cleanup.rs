use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, warn};
use vaultpush_transfer::is_chunk_file_name;

use crate::error::UploadError;

/// Removes chunk files from `dir`, then `dir` itself if nothing else is left.
///
/// Files that do not look like chunk files are never touched. A missing
/// directory counts as already clean. Returns the number of files removed.
pub async fn cleanup_work_dir(dir: &Path) -> Result<usize, UploadError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    let mut others = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let is_chunk =
            is_chunk_file_name(&name.to_string_lossy()) && entry.file_type().await?.is_file();
        if !is_chunk {
            others += 1;
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    if others == 0 {
        match tokio::fs::remove_dir(dir).await {
            Ok(()) => debug!(dir = %dir.display(), "removed working directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove working directory"),
        }
    } else {
        debug!(dir = %dir.display(), others, "working directory kept, not empty");
    }

    info!(dir = %dir.display(), removed, "chunk files cleaned up");
    Ok(removed)
}
