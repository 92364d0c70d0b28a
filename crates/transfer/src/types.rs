use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use vaultpush_protocol::{ByteRange, SessionStatus};

/// One chunk of the source file, materialized as its own file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position in upload order.
    pub index: usize,
    /// Chunk file inside the working directory.
    pub path: PathBuf,
    /// Bytes of the source this chunk covers.
    pub range: ByteRange,
}

impl Chunk {
    /// Size of this chunk in bytes.
    pub fn size(&self) -> u64 {
        self.range.len()
    }
}

/// Point-in-time view of an [`UploadSession`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub vault: String,
    pub description: String,
    pub status: SessionStatus,
    pub part_size: u64,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    pub uploaded_parts: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl SessionSnapshot {
    /// Uploaded share of the archive as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.uploaded_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

/// State of one multipart upload session (thread-safe).
///
/// Created once the service has issued a session id and owned by a single
/// pipeline run.
pub struct UploadSession {
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    id: String,
    vault: String,
    description: String,
    part_size: u64,
    total_size: u64,
    status: SessionStatus,
    uploaded_bytes: u64,
    uploaded_parts: usize,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    error: String,
}

impl UploadSession {
    /// Creates a session in the `Initiated` state.
    pub fn new(
        id: String,
        vault: String,
        description: String,
        part_size: u64,
        total_size: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            inner: RwLock::new(SessionInner {
                id,
                vault,
                description,
                part_size,
                total_size,
                status: SessionStatus::Initiated,
                uploaded_bytes: 0,
                uploaded_parts: 0,
                started_at: now,
                updated_at: now,
                finished_at: None,
                error: String::new(),
            }),
        }
    }

    fn set_status(&self, status: SessionStatus) {
        let mut s = self.inner.write().unwrap();
        s.status = status;
        let now = Utc::now();
        s.updated_at = now;
        if status.is_terminal() {
            s.finished_at = Some(now);
        }
    }

    /// Marks the start of part uploads.
    pub fn begin_parts(&self) {
        self.set_status(SessionStatus::PartsUploading);
    }

    /// Records one successfully uploaded part.
    pub fn record_part(&self, bytes: u64) {
        let mut s = self.inner.write().unwrap();
        s.uploaded_bytes += bytes;
        s.uploaded_parts += 1;
        s.updated_at = Utc::now();
    }

    /// Marks every part as uploaded.
    pub fn parts_complete(&self) {
        self.set_status(SessionStatus::PartsComplete);
    }

    /// Marks the completion call as in flight.
    pub fn begin_finalize(&self) {
        self.set_status(SessionStatus::Finalizing);
    }

    /// Marks the session as completed.
    pub fn complete(&self) {
        self.set_status(SessionStatus::Completed);
    }

    /// Marks the session as failed with an error message.
    pub fn fail(&self, err: &str) {
        {
            let mut s = self.inner.write().unwrap();
            s.error = err.to_string();
        }
        self.set_status(SessionStatus::Failed);
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.inner.read().unwrap();
        SessionSnapshot {
            session_id: s.id.clone(),
            vault: s.vault.clone(),
            description: s.description.clone(),
            status: s.status,
            part_size: s.part_size,
            total_bytes: s.total_size,
            uploaded_bytes: s.uploaded_bytes,
            uploaded_parts: s.uploaded_parts,
            started_at: s.started_at,
            updated_at: s.updated_at,
            finished_at: s.finished_at,
            error: s.error.clone(),
        }
    }

    /// Returns `true` until the session completes or fails.
    pub fn is_active(&self) -> bool {
        let s = self.inner.read().unwrap();
        !s.status.is_terminal()
    }

    /// Returns the service-issued session id.
    pub fn id(&self) -> String {
        let s = self.inner.read().unwrap();
        s.id.clone()
    }

    /// Returns the target vault name.
    pub fn vault(&self) -> String {
        let s = self.inner.read().unwrap();
        s.vault.clone()
    }

    pub fn status(&self) -> SessionStatus {
        let s = self.inner.read().unwrap();
        s.status
    }

    pub fn total_size(&self) -> u64 {
        let s = self.inner.read().unwrap();
        s.total_size
    }

    pub fn uploaded_bytes(&self) -> u64 {
        let s = self.inner.read().unwrap();
        s.uploaded_bytes
    }
}
