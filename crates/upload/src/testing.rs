//! In-memory [`ArchiveService`] used by the crate's tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use vaultpush_protocol::{CompleteUploadResponse, InitiateUploadResponse, UploadPartResponse};
use vaultpush_transfer::tree_hash_files;

use crate::error::UploadError;
use crate::service::{ArchiveService, CompleteRequest, InitiateRequest, PartRequest, ServiceFuture};

/// What the stub returns as the per-part checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    None,
    Correct,
    Wrong,
}

/// Records every call and fails on demand.
pub struct StubService {
    fail_initiate: bool,
    fail_complete: bool,
    fail_on_part: Option<usize>,
    checksums: ChecksumMode,
    delay: Duration,
    initiates: Mutex<Vec<InitiateRequest>>,
    attempts: Mutex<Vec<PartRequest>>,
    uploads: Mutex<Vec<PartRequest>>,
    completes: Mutex<Vec<CompleteRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubService {
    pub fn new() -> Self {
        Self {
            fail_initiate: false,
            fail_complete: false,
            fail_on_part: None,
            checksums: ChecksumMode::None,
            delay: Duration::ZERO,
            initiates: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            completes: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn fail_initiate(mut self) -> Self {
        self.fail_initiate = true;
        self
    }

    pub fn fail_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub fn fail_on_part(mut self, index: usize) -> Self {
        self.fail_on_part = Some(index);
        self
    }

    pub fn with_checksums(mut self, mode: ChecksumMode) -> Self {
        self.checksums = mode;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn initiate_requests(&self) -> Vec<InitiateRequest> {
        self.initiates.lock().unwrap().clone()
    }

    /// Every part request received, including failed ones, in arrival order.
    pub fn part_requests(&self) -> Vec<PartRequest> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempted_indices(&self) -> Vec<usize> {
        self.attempts.lock().unwrap().iter().map(|r| r.index).collect()
    }

    /// Indices of successfully uploaded parts, in completion order.
    pub fn uploaded_indices(&self) -> Vec<usize> {
        self.uploads.lock().unwrap().iter().map(|r| r.index).collect()
    }

    pub fn complete_requests(&self) -> Vec<CompleteRequest> {
        self.completes.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ArchiveService for StubService {
    fn initiate(&self, request: &InitiateRequest) -> ServiceFuture<'_, InitiateUploadResponse> {
        let request = request.clone();
        Box::pin(async move {
            self.initiates.lock().unwrap().push(request.clone());
            if self.fail_initiate {
                return Err(UploadError::Service("vault not found".into()));
            }
            Ok(InitiateUploadResponse {
                location: format!("/-/vaults/{}/multipart-uploads/stub-upload", request.vault),
                upload_id: "stub-upload".into(),
            })
        })
    }

    fn upload_part(&self, request: &PartRequest) -> ServiceFuture<'_, UploadPartResponse> {
        let request = request.clone();
        Box::pin(async move {
            self.attempts.lock().unwrap().push(request.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on_part == Some(request.index) {
                return Err(UploadError::Service(format!(
                    "part {} rejected",
                    request.index
                )));
            }

            let checksum = match self.checksums {
                ChecksumMode::None => None,
                ChecksumMode::Correct => Some(tree_hash_files(&[request.body.clone()])?),
                ChecksumMode::Wrong => Some("0".repeat(64)),
            };
            self.uploads.lock().unwrap().push(request);
            Ok(UploadPartResponse { checksum })
        })
    }

    fn complete(&self, request: &CompleteRequest) -> ServiceFuture<'_, CompleteUploadResponse> {
        let request = request.clone();
        Box::pin(async move {
            self.completes.lock().unwrap().push(request.clone());
            if self.fail_complete {
                return Err(UploadError::Service("tree hash rejected".into()));
            }
            Ok(CompleteUploadResponse {
                location: format!("/-/vaults/{}/archives/stub-archive", request.vault),
                checksum: request.tree_hash,
                archive_id: "stub-archive".into(),
            })
        })
    }
}
