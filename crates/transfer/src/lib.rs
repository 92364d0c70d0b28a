//! Partitioning, tree hashing and progress tracking for multipart archive
//! uploads.
//!
//! A source file is split into ordered chunk files ([`Partitioner`]), each
//! chunk is later uploaded as one part, and the whole file is summarized by
//! a SHA-256 tree hash over 1 MiB leaves ([`TreeHasher`]) that does not
//! depend on the part size.

mod chunked;
mod partition;
mod progress;
mod tree_hash;
mod types;
mod validation;

use std::path::{Path, PathBuf};

pub use chunked::{
    NativeSplitter, SplitCommand, Splitter, chunk_file_name, is_chunk_file_name, name_width,
};
pub use partition::{PartitionPlan, Partitioner, plan_ranges};
pub use progress::{ProgressCallback, ProgressReport, ProgressTracker, SpeedCalculator, format_eta};
pub use tree_hash::{LEAF_SIZE, TreeHasher, fold_leaves, tree_hash_bytes, tree_hash_files};
pub use types::{Chunk, SessionSnapshot, UploadSession};
pub use validation::{parse_size, validate_part_size};

/// Smallest part size the service accepts: 1 MiB.
pub const MIN_PART_SIZE: u64 = 1024 * 1024;

/// Largest part size the service accepts: 4 GiB.
pub const MAX_PART_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Part size used when none is configured.
pub const DEFAULT_PART_SIZE: u64 = MAX_PART_SIZE;

/// File name prefix of every chunk file written into the working directory.
pub const CHUNK_FILE_PREFIX: &str = "part-";

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("partition error: {0}")]
    Partition(String),

    #[error("invalid part size {0}: must be a power of two between 1 MiB and 4 GiB")]
    InvalidPartSize(u64),

    #[error("invalid size: {0}")]
    InvalidSize(String),
}

/// Wraps an I/O error with the path it happened on.
pub(crate) fn fs_error(path: &Path) -> impl FnOnce(std::io::Error) -> TransferError + '_ {
    move |source| TransferError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}
