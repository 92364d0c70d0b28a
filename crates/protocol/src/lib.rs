//! Shared types for talking to the archival storage service.
//!
//! The service exposes three multipart operations (initiate, upload part,
//! complete). The response payloads in [`messages`] mirror the JSON the
//! `aws glacier` CLI prints for each of them.

pub mod messages;
pub mod types;

pub use messages::{CompleteUploadResponse, InitiateUploadResponse, UploadPartResponse};
pub use types::{ByteRange, SessionStatus};
