//! [`ArchiveService`] backed by the `aws glacier` command-line tool.
//!
//! Each operation spawns one `aws` process and parses the JSON it prints
//! on stdout. Authentication, signing and transport timeouts are left to
//! the CLI.

use std::process::Stdio;

use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::debug;
use vaultpush_protocol::{CompleteUploadResponse, InitiateUploadResponse, UploadPartResponse};

use crate::error::UploadError;
use crate::service::{ArchiveService, CompleteRequest, InitiateRequest, PartRequest, ServiceFuture};

/// How to invoke the `aws` CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCliOptions {
    /// Program followed by any leading arguments, e.g. `["aws"]` or
    /// `["aws-vault", "exec", "backup", "--", "aws"]`.
    pub command: Vec<String>,
    /// Account owning the vault; `-` means the credentials' own account.
    pub account_id: String,
    pub profile: Option<String>,
    pub region: Option<String>,
}

impl Default for AwsCliOptions {
    fn default() -> Self {
        Self {
            command: vec!["aws".into()],
            account_id: "-".into(),
            profile: None,
            region: None,
        }
    }
}

/// Talks to the vault through `aws glacier` subcommands.
#[derive(Debug, Clone)]
pub struct AwsCliService {
    options: AwsCliOptions,
}

impl AwsCliService {
    pub fn new(options: AwsCliOptions) -> Result<Self, UploadError> {
        if options.command.is_empty() || options.command[0].is_empty() {
            return Err(UploadError::Config("aws command is empty".into()));
        }
        Ok(Self { options })
    }

    /// Builds `aws glacier <operation>` with the shared arguments.
    fn glacier(&self, operation: &str, vault: &str) -> Command {
        let mut cmd = Command::new(&self.options.command[0]);
        cmd.args(&self.options.command[1..]);
        cmd.arg("glacier").arg(operation);
        if let Some(profile) = &self.options.profile {
            cmd.arg("--profile").arg(profile);
        }
        if let Some(region) = &self.options.region {
            cmd.arg("--region").arg(region);
        }
        cmd.arg("--output").arg("json");
        cmd.arg("--account-id").arg(&self.options.account_id);
        cmd.arg("--vault-name").arg(vault);
        cmd
    }

    fn initiate_command(&self, request: &InitiateRequest) -> Command {
        let mut cmd = self.glacier("initiate-multipart-upload", &request.vault);
        cmd.arg("--archive-description")
            .arg(&request.description)
            .arg("--part-size")
            .arg(request.part_size.to_string());
        cmd
    }

    fn upload_part_command(&self, request: &PartRequest) -> Command {
        let mut cmd = self.glacier("upload-multipart-part", &request.vault);
        cmd.arg("--upload-id")
            .arg(&request.session_id)
            .arg("--body")
            .arg(&request.body)
            .arg("--range")
            .arg(request.range.to_string());
        cmd
    }

    fn complete_command(&self, request: &CompleteRequest) -> Command {
        let mut cmd = self.glacier("complete-multipart-upload", &request.vault);
        cmd.arg("--upload-id")
            .arg(&request.session_id)
            .arg("--archive-size")
            .arg(request.archive_size.to_string())
            .arg("--checksum")
            .arg(&request.tree_hash);
        cmd
    }
}

/// Runs `cmd` and parses its stdout as `T`.
async fn run_json<T: DeserializeOwned>(
    mut cmd: Command,
    operation: &'static str,
) -> Result<T, UploadError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd
        .output()
        .await
        .map_err(|e| UploadError::Service(format!("failed to run aws for {operation}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(UploadError::Service(format!(
            "{operation} failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    debug!(operation, bytes = output.stdout.len(), "aws response received");

    serde_json::from_slice(&output.stdout).map_err(|e| {
        UploadError::Service(format!("unparsable {operation} response: {e}"))
    })
}

impl ArchiveService for AwsCliService {
    fn initiate(&self, request: &InitiateRequest) -> ServiceFuture<'_, InitiateUploadResponse> {
        let cmd = self.initiate_command(request);
        Box::pin(run_json(cmd, "initiate-multipart-upload"))
    }

    fn upload_part(&self, request: &PartRequest) -> ServiceFuture<'_, UploadPartResponse> {
        let cmd = self.upload_part_command(request);
        Box::pin(run_json(cmd, "upload-multipart-part"))
    }

    fn complete(&self, request: &CompleteRequest) -> ServiceFuture<'_, CompleteUploadResponse> {
        let cmd = self.complete_command(request);
        Box::pin(run_json(cmd, "complete-multipart-upload"))
    }
}
