//! Bounded worker pool uploading every chunk exactly once.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultpush_transfer::{Chunk, PartitionPlan, ProgressTracker, UploadSession, tree_hash_files};

use crate::error::UploadError;
use crate::service::{ArchiveService, PartRequest};
use crate::types::PartUploadResult;

/// Uploads the chunks of a [`PartitionPlan`] through a fixed number of
/// workers pulling from one ordered queue.
///
/// The first failure stops every worker; nothing is retried.
pub struct PartUploadDispatcher {
    service: Arc<dyn ArchiveService>,
    parallelism: usize,
    verify_checksums: bool,
    cancel: CancellationToken,
}

/// State shared by the workers of one dispatch.
struct WorkerContext {
    service: Arc<dyn ArchiveService>,
    session: Arc<UploadSession>,
    session_id: String,
    vault: String,
    queue: Mutex<VecDeque<Chunk>>,
    tracker: Option<Arc<ProgressTracker>>,
    verify_checksums: bool,
    cancel: CancellationToken,
}

impl PartUploadDispatcher {
    /// Creates a dispatcher running at most `parallelism` uploads at once
    /// (0 is treated as 1).
    pub fn new(service: Arc<dyn ArchiveService>, parallelism: usize) -> Self {
        Self {
            service,
            parallelism: parallelism.max(1),
            verify_checksums: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Enables comparison of service-reported part checksums.
    pub fn verify_checksums(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    /// Token that stops workers from pulling further chunks when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Uploads every chunk in `plan` within `session`.
    ///
    /// Returns one result per chunk, sorted by index. On the first error
    /// the remaining queue is abandoned, in-flight uploads are aborted and
    /// that error is returned.
    pub async fn dispatch(
        &self,
        session: &Arc<UploadSession>,
        plan: &PartitionPlan,
        tracker: Option<Arc<ProgressTracker>>,
    ) -> Result<Vec<PartUploadResult>, UploadError> {
        let workers = self.parallelism.min(plan.len());
        let cancel = self.cancel.child_token();

        let ctx = Arc::new(WorkerContext {
            service: Arc::clone(&self.service),
            session: Arc::clone(session),
            session_id: session.id(),
            vault: session.vault(),
            queue: Mutex::new(plan.chunks().iter().cloned().collect()),
            tracker,
            verify_checksums: self.verify_checksums,
            cancel: cancel.clone(),
        });

        info!(
            session = %ctx.session_id,
            parts = plan.len(),
            workers,
            "uploading parts"
        );

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let ctx = Arc::clone(&ctx);
            set.spawn(run_worker(ctx, worker));
        }

        let mut results = Vec::with_capacity(plan.len());
        while let Some(joined) = set.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(UploadError::Task(e.to_string())),
            };
            match outcome {
                Ok(mut done) => results.append(&mut done),
                Err(e) => {
                    cancel.cancel();
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    return Err(e);
                }
            }
        }

        if self.cancel.is_cancelled() && results.len() < plan.len() {
            return Err(UploadError::Task(format!(
                "dispatch cancelled after {} of {} parts",
                results.len(),
                plan.len()
            )));
        }

        results.sort_by_key(|r| r.index);
        Ok(results)
    }
}

/// Pulls chunks until the queue is empty, an upload fails or the dispatch
/// is cancelled.
async fn run_worker(
    ctx: Arc<WorkerContext>,
    worker: usize,
) -> Result<Vec<PartUploadResult>, UploadError> {
    let mut done = Vec::new();

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let Some(chunk) = ctx.queue.lock().unwrap().pop_front() else {
            break;
        };

        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            r = upload_chunk(&ctx, &chunk) => r,
        };

        match result {
            Ok(part) => {
                ctx.session.record_part(chunk.size());
                if let Some(tracker) = &ctx.tracker {
                    tracker.record(part.index, chunk.size(), part.elapsed);
                }
                done.push(part);
            }
            Err(e) => {
                warn!(worker, part = chunk.index, error = %e, "part upload failed");
                ctx.cancel.cancel();
                return Err(e);
            }
        }
    }

    debug!(worker, parts = done.len(), "worker finished");
    Ok(done)
}

async fn upload_chunk(ctx: &WorkerContext, chunk: &Chunk) -> Result<PartUploadResult, UploadError> {
    let request = PartRequest {
        session_id: ctx.session_id.clone(),
        vault: ctx.vault.clone(),
        index: chunk.index,
        range: chunk.range,
        body: chunk.path.clone(),
    };

    let started = Instant::now();
    let response = ctx.service.upload_part(&request).await?;
    let elapsed = started.elapsed();

    debug!(
        part = chunk.index,
        range = %chunk.range,
        elapsed_ms = elapsed.as_millis() as u64,
        "part uploaded"
    );

    if ctx.verify_checksums {
        verify_part(chunk, response.checksum.as_deref()).await?;
    }

    Ok(PartUploadResult {
        index: chunk.index,
        range: chunk.range,
        success: true,
        checksum: response.checksum,
        elapsed,
    })
}

/// Compares the service checksum of one part with its local tree hash.
async fn verify_part(chunk: &Chunk, reported: Option<&str>) -> Result<(), UploadError> {
    let Some(reported) = reported else {
        warn!(part = chunk.index, "service returned no checksum, skipping verification");
        return Ok(());
    };

    let paths = vec![chunk.path.clone()];
    let local = tokio::task::spawn_blocking(move || tree_hash_files(&paths))
        .await
        .map_err(|e| UploadError::Task(e.to_string()))??;

    if !local.eq_ignore_ascii_case(reported) {
        return Err(UploadError::Integrity(format!(
            "part {} checksum mismatch: local {local}, service {reported}",
            chunk.index
        )));
    }
    debug!(part = chunk.index, "part checksum verified");
    Ok(())
}
