use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::{debug, error, info, warn};
use vaultpush_transfer::{
    PartitionPlan, Partitioner, ProgressCallback, ProgressTracker, Splitter, UploadSession,
    tree_hash_files, validate_part_size,
};

use crate::cleanup::cleanup_work_dir;
use crate::dispatcher::PartUploadDispatcher;
use crate::error::UploadError;
use crate::service::{ArchiveService, CompleteRequest, InitiateRequest};
use crate::types::{UploadConfig, UploadOutcome};

/// Runs one archive upload from partitioning to cleanup.
pub struct UploadPipeline {
    service: Arc<dyn ArchiveService>,
    partitioner: Partitioner,
    callbacks: RwLock<Vec<ProgressCallback>>,
}

impl UploadPipeline {
    pub fn new(service: Arc<dyn ArchiveService>, splitter: Arc<dyn Splitter>) -> Self {
        Self {
            service,
            partitioner: Partitioner::new(splitter),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Registers a callback invoked after every uploaded part.
    pub fn on_progress(&self, callback: ProgressCallback) {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.push(callback);
    }

    /// Uploads `config.source` and returns the archive id.
    ///
    /// The pipeline:
    /// 1. Partition the source into chunk files
    /// 2. Initiate the multipart session
    /// 3. Upload every chunk through the worker pool
    /// 4. Tree-hash the chunk files
    /// 5. Complete the session
    /// 6. Remove the chunk files
    ///
    /// Any error aborts the run. Chunk files are kept on failure unless
    /// `cleanup_on_failure` is set.
    pub async fn run(&self, config: &UploadConfig) -> Result<UploadOutcome, UploadError> {
        validate_config(config)?;

        let mut session: Option<Arc<UploadSession>> = None;
        let result = self.execute(config, &mut session).await;

        match result {
            Ok(mut outcome) => {
                outcome.cleaned_up = match cleanup_work_dir(&config.work_dir).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(dir = %config.work_dir.display(), error = %e, "cleanup failed");
                        false
                    }
                };
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "upload failed");
                if let Some(session) = &session {
                    session.fail(&e.to_string());
                }
                if config.cleanup_on_failure {
                    if let Err(cleanup_err) = cleanup_work_dir(&config.work_dir).await {
                        warn!(
                            dir = %config.work_dir.display(),
                            error = %cleanup_err,
                            "cleanup after failure failed"
                        );
                    }
                } else {
                    warn!(dir = %config.work_dir.display(), "chunk files left in working directory");
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        config: &UploadConfig,
        session_slot: &mut Option<Arc<UploadSession>>,
    ) -> Result<UploadOutcome, UploadError> {
        // 1. Partition
        let plan = self
            .partitioner
            .partition(&config.source, config.part_size, &config.work_dir)
            .await?;

        info!(
            source = %config.source.display(),
            total_bytes = plan.total_size(),
            parts = plan.len(),
            part_size = plan.part_size(),
            "source partitioned"
        );

        // 2. Initiate
        let initiated = self
            .service
            .initiate(&InitiateRequest {
                vault: config.vault.clone(),
                description: config.description.clone(),
                part_size: plan.part_size(),
            })
            .await?;
        if initiated.upload_id.is_empty() {
            return Err(UploadError::Service("service returned an empty upload id".into()));
        }

        info!(session = %initiated.upload_id, vault = %config.vault, "multipart upload initiated");

        let session = Arc::new(UploadSession::new(
            initiated.upload_id.clone(),
            config.vault.clone(),
            config.description.clone(),
            plan.part_size(),
            plan.total_size(),
        ));
        *session_slot = Some(Arc::clone(&session));

        // 3. Upload parts
        session.begin_parts();
        let tracker = Arc::new(ProgressTracker::new(plan.len(), config.parallelism));
        let callbacks = self.callbacks.read().unwrap().clone();
        for cb in callbacks {
            tracker.on_progress(cb);
        }

        let dispatcher = PartUploadDispatcher::new(Arc::clone(&self.service), config.parallelism)
            .verify_checksums(config.verify_part_checksums);
        let parts = dispatcher
            .dispatch(&session, &plan, Some(Arc::clone(&tracker)))
            .await?;
        session.parts_complete();

        // 4. Tree hash
        let tree_hash = hash_plan(&plan).await?;
        info!(tree_hash = %tree_hash, "tree hash computed");

        // 5. Complete
        session.begin_finalize();
        let completed = self
            .service
            .complete(&CompleteRequest {
                session_id: session.id(),
                vault: config.vault.clone(),
                archive_size: plan.total_size(),
                tree_hash: tree_hash.clone(),
            })
            .await?;
        if completed.archive_id.is_empty() {
            return Err(UploadError::Service("service returned an empty archive id".into()));
        }
        if !completed.checksum.is_empty() && !completed.checksum.eq_ignore_ascii_case(&tree_hash) {
            warn!(
                local = %tree_hash,
                service = %completed.checksum,
                "service reported a different archive checksum"
            );
        }
        session.complete();

        info!(
            archive_id = %completed.archive_id,
            total_bytes = plan.total_size(),
            "archive upload complete"
        );

        Ok(UploadOutcome {
            archive_id: completed.archive_id,
            location: completed.location,
            session_id: session.id(),
            tree_hash,
            total_size: plan.total_size(),
            parts,
            session: session.snapshot(),
            cleaned_up: false,
        })
    }
}

fn validate_config(config: &UploadConfig) -> Result<(), UploadError> {
    if config.vault.trim().is_empty() {
        return Err(UploadError::Config("vault name is empty".into()));
    }
    if config.source.as_os_str().is_empty() {
        return Err(UploadError::Config("source path is empty".into()));
    }
    if config.work_dir.as_os_str().is_empty() {
        return Err(UploadError::Config("working directory is empty".into()));
    }
    if config.parallelism == 0 {
        return Err(UploadError::Config("parallelism must be at least 1".into()));
    }
    validate_part_size(config.part_size)?;
    Ok(())
}

/// Tree hash over every chunk file of `plan`, on the blocking pool.
async fn hash_plan(plan: &PartitionPlan) -> Result<String, UploadError> {
    let paths: Vec<PathBuf> = plan.chunk_paths();
    debug!(files = paths.len(), "hashing chunk files");
    let hash = tokio::task::spawn_blocking(move || tree_hash_files(&paths))
        .await
        .map_err(|e| UploadError::Task(e.to_string()))??;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChecksumMode, StubService};
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vaultpush_protocol::SessionStatus;
    use vaultpush_transfer::{NativeSplitter, ProgressReport, TransferError, tree_hash_bytes};

    const MIB: u64 = 1024 * 1024;

    fn source(dir: &Path, size: u64) -> (PathBuf, Vec<u8>) {
        let path = dir.join("backup.tar");
        let data: Vec<u8> = (0..size).map(|i| (i * 7 % 256) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        (path, data)
    }

    fn config(dir: &Path, source: PathBuf, part_size: u64, parallelism: usize) -> UploadConfig {
        UploadConfig {
            part_size,
            parallelism,
            work_dir: dir.join("backup_parts"),
            ..UploadConfig::new(source, "nightly backup", "archive-vault")
        }
    }

    fn pipeline(stub: &Arc<StubService>) -> UploadPipeline {
        UploadPipeline::new(stub.clone(), Arc::new(NativeSplitter::new(0)))
    }

    #[tokio::test]
    async fn uploads_five_mib_in_three_parts() {
        let dir = TempDir::new().unwrap();
        let (src, data) = source(dir.path(), 5 * MIB);
        let stub = Arc::new(StubService::new());
        let config = config(dir.path(), src, 2 * MIB, 2);

        let outcome = pipeline(&stub).run(&config).await.unwrap();

        assert_eq!(outcome.archive_id, "stub-archive");
        assert_eq!(outcome.parts.len(), 3);
        assert!(outcome.parts.iter().all(|p| p.success));
        let sizes: Vec<u64> = outcome.parts.iter().map(|p| p.range.len()).collect();
        assert_eq!(sizes, vec![2_097_152, 2_097_152, 1_048_576]);
        assert_eq!(sizes.iter().sum::<u64>(), 5 * MIB);

        let initiates = stub.initiate_requests();
        assert_eq!(initiates.len(), 1);
        assert_eq!(initiates[0].part_size, 2 * MIB);
        assert_eq!(initiates[0].description, "nightly backup");

        let completes = stub.complete_requests();
        assert_eq!(completes.len(), 1);
        assert_eq!(completes[0].archive_size, 5_242_880);
        assert_eq!(completes[0].tree_hash, tree_hash_bytes(&data));
        assert_eq!(completes[0].session_id, "stub-upload");
        assert_eq!(outcome.tree_hash, completes[0].tree_hash);

        assert_eq!(outcome.session.status, SessionStatus::Completed);
        assert_eq!(outcome.session.uploaded_bytes, 5 * MIB);
        assert!(outcome.cleaned_up);
        assert!(!config.work_dir.exists());
    }

    #[tokio::test]
    async fn part_failure_skips_complete_and_remaining_parts() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 5 * MIB);
        let stub = Arc::new(StubService::new().fail_on_part(2));
        let config = config(dir.path(), src, 2 * MIB, 1);

        let err = pipeline(&stub).run(&config).await.unwrap_err();

        assert!(matches!(err, UploadError::Service(_)));
        assert_eq!(stub.attempted_indices(), vec![1, 2]);
        assert!(stub.complete_requests().is_empty());
        // Chunk files stay for inspection by default.
        assert!(config.work_dir.join("part-0001").exists());
        assert!(config.work_dir.join("part-0003").exists());
    }

    #[tokio::test]
    async fn cleanup_on_failure_removes_chunks() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 3 * MIB);
        let stub = Arc::new(StubService::new().fail_on_part(1));
        let config = UploadConfig {
            cleanup_on_failure: true,
            ..config(dir.path(), src, MIB, 1)
        };

        pipeline(&stub).run(&config).await.unwrap_err();
        assert!(!config.work_dir.exists());
    }

    #[tokio::test]
    async fn initiate_failure_uploads_nothing() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 2 * MIB);
        let stub = Arc::new(StubService::new().fail_initiate());
        let config = config(dir.path(), src, MIB, 2);

        let err = pipeline(&stub).run(&config).await.unwrap_err();
        assert!(matches!(err, UploadError::Service(_)));
        assert!(stub.part_requests().is_empty());
        assert!(stub.complete_requests().is_empty());
    }

    #[tokio::test]
    async fn complete_failure_is_returned() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 2 * MIB);
        let stub = Arc::new(StubService::new().fail_complete());
        let config = config(dir.path(), src, MIB, 2);

        let err = pipeline(&stub).run(&config).await.unwrap_err();
        assert!(matches!(err, UploadError::Service(_)));
        assert_eq!(stub.uploaded_indices().len(), 2);
        assert_eq!(stub.complete_requests().len(), 1);
        assert!(config.work_dir.join("part-0001").exists());
    }

    #[tokio::test]
    async fn missing_source_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let stub = Arc::new(StubService::new());
        let config = config(dir.path(), dir.path().join("nope.bin"), MIB, 1);

        let err = pipeline(&stub).run(&config).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Transfer(TransferError::Filesystem { .. })
        ));
        assert!(stub.initiate_requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_work() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), MIB);
        let stub = Arc::new(StubService::new());

        let empty_vault = UploadConfig {
            vault: "  ".into(),
            ..config(dir.path(), src.clone(), MIB, 1)
        };
        assert!(matches!(
            pipeline(&stub).run(&empty_vault).await,
            Err(UploadError::Config(_))
        ));

        let bad_size = config(dir.path(), src, 3 * MIB, 1);
        assert!(matches!(
            pipeline(&stub).run(&bad_size).await,
            Err(UploadError::Transfer(TransferError::InvalidPartSize(_)))
        ));
        assert!(!dir.path().join("backup_parts").exists());
    }

    #[tokio::test]
    async fn progress_callback_sees_every_part() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 4 * MIB);
        let stub = Arc::new(StubService::new());
        let config = config(dir.path(), src, MIB, 2);

        let reports: Arc<Mutex<Vec<ProgressReport>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let pipeline = pipeline(&stub);
        pipeline.on_progress(Arc::new(move |r: &ProgressReport| {
            sink.lock().unwrap().push(r.clone());
        }));

        pipeline.run(&config).await.unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.total_parts == 4 && r.parallelism == 2));
        let last = reports.iter().max_by_key(|r| r.completed_parts).unwrap();
        assert_eq!(last.completed_parts, 4);
        assert_eq!(last.remaining_parts, 0);
    }

    #[tokio::test]
    async fn verified_upload_succeeds_with_correct_checksums() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 3 * MIB);
        let stub = Arc::new(StubService::new().with_checksums(ChecksumMode::Correct));
        let config = UploadConfig {
            verify_part_checksums: true,
            ..config(dir.path(), src, MIB, 3)
        };

        let outcome = pipeline(&stub).run(&config).await.unwrap();
        assert_eq!(outcome.parts.len(), 3);
    }

    #[tokio::test]
    async fn verified_upload_fails_on_checksum_mismatch() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 2 * MIB);
        let stub = Arc::new(StubService::new().with_checksums(ChecksumMode::Wrong));
        let config = UploadConfig {
            verify_part_checksums: true,
            ..config(dir.path(), src, MIB, 1)
        };

        let err = pipeline(&stub).run(&config).await.unwrap_err();
        assert!(matches!(err, UploadError::Integrity(_)));
        assert!(stub.complete_requests().is_empty());
    }

    #[tokio::test]
    async fn tree_hash_independent_of_part_size() {
        let dir = TempDir::new().unwrap();
        let (src, _) = source(dir.path(), 4 * MIB + 123);

        let mut hashes = Vec::new();
        for part_size in [MIB, 2 * MIB, 4 * MIB] {
            let stub = Arc::new(StubService::new());
            let config = config(dir.path(), src.clone(), part_size, 2);
            hashes.push(pipeline(&stub).run(&config).await.unwrap().tree_hash);
        }
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }
}
