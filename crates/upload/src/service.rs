//! Archive service trait.
//!
//! `ArchiveService` abstracts the three multipart operations of the remote
//! vault. The pipeline only talks to this trait, which keeps it testable
//! with in-memory stubs.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use vaultpush_protocol::{
    ByteRange, CompleteUploadResponse, InitiateUploadResponse, UploadPartResponse,
};

use crate::error::UploadError;

/// Boxed future returned by [`ArchiveService`] operations.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Opens a multipart session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    pub vault: String,
    pub description: String,
    pub part_size: u64,
}

/// Uploads one part of an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRequest {
    pub session_id: String,
    pub vault: String,
    /// 1-based chunk index, for logging only; the range is authoritative.
    pub index: usize,
    pub range: ByteRange,
    /// File holding exactly `range.len()` bytes.
    pub body: PathBuf,
}

/// Closes a session once every part is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteRequest {
    pub session_id: String,
    pub vault: String,
    pub archive_size: u64,
    /// Lowercase hex tree hash of the whole archive.
    pub tree_hash: String,
}

/// Remote archival storage with a multipart-upload API.
///
/// Implementations must not hold on to the request references beyond the
/// call; the returned future only borrows `self`.
pub trait ArchiveService: Send + Sync {
    fn initiate(&self, request: &InitiateRequest) -> ServiceFuture<'_, InitiateUploadResponse>;

    fn upload_part(&self, request: &PartRequest) -> ServiceFuture<'_, UploadPartResponse>;

    fn complete(&self, request: &CompleteRequest) -> ServiceFuture<'_, CompleteUploadResponse>;
}
