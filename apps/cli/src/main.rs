//! vaultpush: upload one file to an archival vault as a multipart upload.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vaultpush_transfer::{
    DEFAULT_PART_SIZE, NativeSplitter, ProgressReport, SplitCommand, Splitter, parse_size,
};
use vaultpush_upload::{
    AwsCliOptions, AwsCliService, UploadConfig, UploadPipeline, default_parallelism,
    default_work_dir,
};

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "vaultpush")]
#[command(about = "Upload a file to an archival vault as a parallel multipart upload")]
#[command(version)]
struct Cli {
    /// File to archive
    file: PathBuf,

    /// Archive description stored with the archive
    description: String,

    /// Target vault name
    vault: String,

    /// Part size: power of two between 1m and 4g (k/m/g suffixes accepted)
    part_size: Option<String>,

    /// Concurrent part uploads (default: CPU count)
    #[arg(short = 'j', long)]
    parallelism: Option<usize>,

    /// Directory for chunk files (default: <temp>/<file stem>_parts)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Config file path
    #[arg(long, env = "VAULTPUSH_CONFIG")]
    config: Option<PathBuf>,

    /// Split with the coreutils `split` tool instead of in process
    #[arg(long)]
    split_command: bool,

    /// Compare each part's checksum reported by the service with the local one
    #[arg(long)]
    verify_part_checksums: bool,

    /// Remove chunk files even if the upload fails
    #[arg(long)]
    cleanup_on_failure: bool,

    /// Vault owner account id (`-` for the caller's account)
    #[arg(long)]
    account_id: Option<String>,

    /// aws CLI profile
    #[arg(long)]
    profile: Option<String>,

    /// aws region
    #[arg(long)]
    region: Option<String>,

    /// aws executable
    #[arg(long)]
    aws_bin: Option<String>,
}

/// Everything needed for one run after merging flags and config file.
#[derive(Debug)]
struct Settings {
    upload: UploadConfig,
    aws: AwsCliOptions,
    use_split_command: bool,
}

/// Merges command-line flags over config file values.
fn resolve(cli: Cli, file: Config) -> Result<Settings> {
    let part_size = match cli.part_size.as_deref().or(file.part_size.as_deref()) {
        Some(raw) => parse_size(raw).with_context(|| format!("invalid part size {raw:?}"))?,
        None => DEFAULT_PART_SIZE,
    };

    let parallelism = cli
        .parallelism
        .or(file.parallelism)
        .unwrap_or_else(default_parallelism);

    let work_dir = cli
        .work_dir
        .unwrap_or_else(|| default_work_dir(&cli.file, file.work_root.as_deref()));

    let upload = UploadConfig {
        part_size,
        parallelism,
        work_dir,
        verify_part_checksums: cli.verify_part_checksums || file.verify_part_checksums,
        cleanup_on_failure: cli.cleanup_on_failure || file.cleanup_on_failure,
        ..UploadConfig::new(cli.file, cli.description, cli.vault)
    };

    let aws = AwsCliOptions {
        command: vec![cli.aws_bin.unwrap_or(file.aws_bin)],
        account_id: cli.account_id.unwrap_or(file.account_id),
        profile: cli.profile.or(file.profile),
        region: cli.region.or(file.region),
    };

    Ok(Settings {
        upload,
        aws,
        use_split_command: cli.split_command || file.use_split_command,
    })
}

/// Names the basis of the per-part ETA: with several workers it is the
/// per-worker latency estimate, otherwise plain wall clock.
fn eta_basis(report: &ProgressReport) -> &'static str {
    if report.is_latency_based() {
        "per_worker"
    } else {
        "wall_clock"
    }
}

fn log_progress(report: &ProgressReport) {
    let mib_per_sec = |bytes_per_sec: f64| bytes_per_sec / (1024.0 * 1024.0);
    tracing::info!(
        part = report.part_index,
        completed = report.completed_parts,
        total = report.total_parts,
        percent = %format!("{:.1}", report.percentage()),
        part_secs = %format!("{:.1}", report.part_elapsed.as_secs_f64()),
        part_mib_s = %format!("{:.2}", mib_per_sec(report.part_throughput)),
        eta = %report.eta_display(),
        eta_basis = eta_basis(report),
        wall_eta = %report.wall_clock_eta_display(),
        wall_mib_s = %format!("{:.2}", mib_per_sec(report.wall_clock_throughput)),
        "part uploaded"
    );
}

async fn run(settings: Settings) -> Result<()> {
    let splitter: Arc<dyn Splitter> = if settings.use_split_command {
        Arc::new(SplitCommand::new("split"))
    } else {
        Arc::new(NativeSplitter::new(0))
    };
    let service = Arc::new(AwsCliService::new(settings.aws)?);

    let pipeline = UploadPipeline::new(service, splitter);
    pipeline.on_progress(Arc::new(log_progress));

    let config = &settings.upload;
    tracing::info!(
        file = %config.source.display(),
        vault = %config.vault,
        part_size = config.part_size,
        parallelism = config.parallelism,
        work_dir = %config.work_dir.display(),
        "starting upload"
    );

    let outcome = pipeline
        .run(config)
        .await
        .with_context(|| format!("upload of {} failed", config.source.display()))?;

    tracing::info!(
        archive_id = %outcome.archive_id,
        tree_hash = %outcome.tree_hash,
        total_bytes = outcome.total_size,
        parts = outcome.parts.len(),
        "upload finished"
    );
    println!("{}", outcome.archive_id);
    Ok(())
}

fn main() -> Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = Config::load(cli.config.as_deref())?;
    let settings = resolve(cli, file)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(settings))
}
