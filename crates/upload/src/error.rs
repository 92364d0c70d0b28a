//! Upload error types.

/// Errors produced while uploading an archive.
///
/// Every variant is fatal for the run; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("service error: {0}")]
    Service(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Transfer(#[from] vaultpush_transfer::TransferError),
}
