//! Multipart archive upload pipeline.
//!
//! This crate drives one upload of a local file into an archival vault.
//! It is a library crate with no CLI dependencies: callers inject an
//! [`ArchiveService`] (the production one shells out to the `aws` CLI)
//! and a [`Splitter`](vaultpush_transfer::Splitter).
//!
//! # Pipeline
//!
//! 1. **Partition**: split the source into ordered chunk files
//! 2. **Initiate**: open a multipart session with the service
//! 3. **Upload**: send every chunk exactly once through a bounded worker pool
//! 4. **Hash**: compute the tree hash over all chunk files
//! 5. **Complete**: submit size and tree hash, receive the archive id
//! 6. **Cleanup**: remove the chunk files

pub mod aws_cli;
pub mod cleanup;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod types;

#[cfg(test)]
mod testing;

pub use aws_cli::{AwsCliOptions, AwsCliService};
pub use cleanup::cleanup_work_dir;
pub use dispatcher::PartUploadDispatcher;
pub use error::UploadError;
pub use pipeline::UploadPipeline;
pub use service::{ArchiveService, CompleteRequest, InitiateRequest, PartRequest, ServiceFuture};
pub use types::{
    PartUploadResult, UploadConfig, UploadOutcome, default_parallelism, default_work_dir,
};
