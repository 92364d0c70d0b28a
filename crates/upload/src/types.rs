use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use vaultpush_protocol::ByteRange;
use vaultpush_transfer::{DEFAULT_PART_SIZE, SessionSnapshot};

/// Suffix appended to the source file stem for the default working directory.
const WORK_DIR_SUFFIX: &str = "_parts";

/// Everything one upload run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// File to archive.
    pub source: PathBuf,
    /// Free-form archive description stored by the service.
    pub description: String,
    /// Target vault name.
    pub vault: String,
    /// Part size in bytes; a power of two between 1 MiB and 4 GiB.
    pub part_size: u64,
    /// Directory holding the chunk files.
    pub work_dir: PathBuf,
    /// Number of concurrent part uploads.
    pub parallelism: usize,
    /// Compare each part's tree hash with the checksum the service returns.
    pub verify_part_checksums: bool,
    /// Remove chunk files even when the run fails.
    pub cleanup_on_failure: bool,
}

impl UploadConfig {
    /// Config with default part size, parallelism and working directory.
    pub fn new(
        source: impl Into<PathBuf>,
        description: impl Into<String>,
        vault: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let work_dir = default_work_dir(&source, None);
        Self {
            source,
            description: description.into(),
            vault: vault.into(),
            part_size: DEFAULT_PART_SIZE,
            work_dir,
            parallelism: default_parallelism(),
            verify_part_checksums: false,
            cleanup_on_failure: false,
        }
    }
}

/// Number of logical CPUs, or 1 if unknown.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// `<root>/<stem>_parts`, with `root` defaulting to the system temp dir.
pub fn default_work_dir(source: &Path, root: Option<&Path>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "archive".into());
    let root = root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    root.join(format!("{stem}{WORK_DIR_SUFFIX}"))
}

/// Outcome of one part upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUploadResult {
    pub index: usize,
    pub range: ByteRange,
    pub success: bool,
    /// Checksum reported by the service, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Result of a completed upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub archive_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    pub session_id: String,
    pub tree_hash: String,
    pub total_size: u64,
    pub parts: Vec<PartUploadResult>,
    pub session: SessionSnapshot,
    /// Whether the working directory was cleaned up.
    pub cleaned_up: bool,
}
