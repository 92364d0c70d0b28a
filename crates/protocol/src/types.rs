use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive byte range of one part within the whole archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteRange {
    /// First byte offset (inclusive).
    pub low: u64,
    /// Last byte offset (inclusive).
    pub high: u64,
    /// Size of the whole archive in bytes.
    pub total: u64,
}

impl ByteRange {
    pub fn new(low: u64, high: u64, total: u64) -> Self {
        Self { low, high, total }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.high - self.low + 1
    }

    /// A range always covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns `true` if `next` starts right after this range ends.
    pub fn is_followed_by(&self, next: &ByteRange) -> bool {
        self.high + 1 == next.low
    }
}

/// Formats as the service's range argument: `bytes <low>-<high>/<total>`.
impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.low, self.high, self.total)
    }
}

/// Lifecycle of one multipart upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[serde(rename = "initiated")]
    Initiated,
    #[serde(rename = "parts_uploading")]
    PartsUploading,
    #[serde(rename = "parts_complete")]
    PartsComplete,
    #[serde(rename = "finalizing")]
    Finalizing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl SessionStatus {
    /// Returns `true` once the session can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}
