//! Partition planning: turns a source file into ordered chunk files with
//! their byte ranges.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use vaultpush_protocol::ByteRange;

use crate::chunked::{Splitter, is_chunk_file_name};
use crate::types::Chunk;
use crate::validation::validate_part_size;
use crate::{TransferError, fs_error};

/// Ordered chunks of one source file, ready to upload.
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    part_size: u64,
    total_size: u64,
    chunks: Vec<Chunk>,
}

impl PartitionPlan {
    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Total size of the source in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Chunks in upload order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk file paths in upload order.
    pub fn chunk_paths(&self) -> Vec<PathBuf> {
        self.chunks.iter().map(|c| c.path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Computes the byte ranges for a file of `total_size` split every
/// `part_size` bytes.
pub fn plan_ranges(total_size: u64, part_size: u64) -> Vec<ByteRange> {
    let mut ranges = Vec::new();
    if total_size == 0 || part_size == 0 {
        return ranges;
    }

    let mut low = 0u64;
    while low < total_size {
        let high = (low + part_size - 1).min(total_size - 1);
        ranges.push(ByteRange::new(low, high, total_size));
        low = high + 1;
    }
    ranges
}

/// Splits source files into chunk files using an injected [`Splitter`].
#[derive(Clone)]
pub struct Partitioner {
    splitter: Arc<dyn Splitter>,
}

impl Partitioner {
    pub fn new(splitter: Arc<dyn Splitter>) -> Self {
        Self { splitter }
    }

    /// Splits `source` into `part_size` chunks inside `work_dir`.
    ///
    /// The working directory is created if missing; leftover chunk files
    /// from an earlier run are removed first. After splitting, every chunk
    /// file is checked against the planned byte range.
    pub async fn partition(
        &self,
        source: &Path,
        part_size: u64,
        work_dir: &Path,
    ) -> Result<PartitionPlan, TransferError> {
        let part_size = validate_part_size(part_size)?;

        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(fs_error(source))?;
        if !metadata.is_file() {
            return Err(TransferError::Filesystem {
                path: source.to_path_buf(),
                source: std::io::Error::other("not a regular file"),
            });
        }
        let total_size = metadata.len();
        if total_size == 0 {
            return Err(TransferError::Partition(format!(
                "source is empty: {}",
                source.display()
            )));
        }

        info!(
            source = %source.display(),
            total_bytes = total_size,
            part_size,
            "partitioning source"
        );

        check_source_outside_chunks(source, work_dir).await?;
        prepare_work_dir(work_dir).await?;

        self.splitter.split(source, part_size, work_dir).await?;

        let files = list_chunk_files(work_dir).await?;
        let ranges = plan_ranges(total_size, part_size);
        if files.len() != ranges.len() {
            return Err(TransferError::Partition(format!(
                "{} splitter produced {} chunk files, expected {}",
                self.splitter.name(),
                files.len(),
                ranges.len()
            )));
        }

        let mut chunks = Vec::with_capacity(ranges.len());
        for (i, (path, range)) in files.into_iter().zip(ranges).enumerate() {
            let size = tokio::fs::metadata(&path)
                .await
                .map_err(fs_error(&path))?
                .len();
            if size != range.len() {
                return Err(TransferError::Partition(format!(
                    "chunk {} is {size} bytes, expected {}",
                    path.display(),
                    range.len()
                )));
            }
            chunks.push(Chunk {
                index: i + 1,
                path,
                range,
            });
        }

        debug!(chunks = chunks.len(), dir = %work_dir.display(), "partition plan ready");

        Ok(PartitionPlan {
            part_size,
            total_size,
            chunks,
        })
    }
}

/// Refuses a source that sits in the working directory under a chunk file
/// name, since stale-chunk removal or the splitter would overwrite it.
async fn check_source_outside_chunks(source: &Path, work_dir: &Path) -> Result<(), TransferError> {
    let canonical_dir = match tokio::fs::canonicalize(work_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(fs_error(work_dir)(e)),
    };
    let canonical_source = tokio::fs::canonicalize(source)
        .await
        .map_err(fs_error(source))?;

    let is_chunk_name = canonical_source
        .file_name()
        .is_some_and(|name| is_chunk_file_name(&name.to_string_lossy()));
    if is_chunk_name && canonical_source.parent() == Some(canonical_dir.as_path()) {
        return Err(TransferError::Filesystem {
            path: source.to_path_buf(),
            source: std::io::Error::other(
                "source is named like a chunk file inside the working directory",
            ),
        });
    }
    Ok(())
}

/// Creates the working directory, tolerating one that already exists.
async fn prepare_work_dir(dir: &Path) -> Result<(), TransferError> {
    match tokio::fs::create_dir(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            if !tokio::fs::metadata(dir).await.map_err(fs_error(dir))?.is_dir() {
                return Err(TransferError::Filesystem {
                    path: dir.to_path_buf(),
                    source: std::io::Error::other("exists and is not a directory"),
                });
            }
            for stale in list_chunk_files(dir).await? {
                tokio::fs::remove_file(&stale)
                    .await
                    .map_err(fs_error(&stale))?;
                debug!(path = %stale.display(), "removed stale chunk file");
            }
        }
        Err(e) => return Err(fs_error(dir)(e)),
    }
    Ok(())
}

/// Lists chunk files in `dir`, sorted by file name.
async fn list_chunk_files(dir: &Path) -> Result<Vec<PathBuf>, TransferError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(fs_error(dir))?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(fs_error(dir))? {
        let name = entry.file_name();
        if !is_chunk_file_name(&name.to_string_lossy()) {
            continue;
        }
        if entry.file_type().await.map_err(fs_error(dir))?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
