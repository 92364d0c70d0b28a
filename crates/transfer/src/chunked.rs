use std::fs::File;
use std::future::Future;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tracing::debug;

use crate::{CHUNK_FILE_PREFIX, TransferError, fs_error};

/// Copy buffer used by [`NativeSplitter`]: 1 MiB.
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Minimum number of digits in a chunk file suffix.
const MIN_NAME_WIDTH: usize = 4;

/// Writes the chunk files of a source file into a directory.
///
/// Implementations must produce one file per chunk, each named with
/// [`CHUNK_FILE_PREFIX`] followed by a fixed-width suffix, so that sorting
/// the names lexicographically yields the chunks in file order.
pub trait Splitter: Send + Sync {
    fn split<'a>(
        &'a self,
        source: &'a Path,
        chunk_size: u64,
        dir: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send + 'a>>;

    /// Short name used in log lines.
    fn name(&self) -> &str;
}

/// Number of suffix digits needed to name `chunk_count` chunks.
pub fn name_width(chunk_count: u64) -> usize {
    let digits = chunk_count.max(1).to_string().len();
    digits.max(MIN_NAME_WIDTH)
}

/// File name of the chunk with 1-based `index`, e.g. `part-0007`.
pub fn chunk_file_name(index: u64, width: usize) -> String {
    format!("{CHUNK_FILE_PREFIX}{index:0width$}")
}

/// Returns `true` for names a splitter writes: the chunk prefix followed by
/// ASCII digits only, e.g. `part-0007`. `part-list.txt` is not a chunk.
pub fn is_chunk_file_name(name: &str) -> bool {
    name.strip_prefix(CHUNK_FILE_PREFIX)
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// NativeSplitter
// ---------------------------------------------------------------------------

/// Splits the source in-process by streaming it through a fixed buffer.
#[derive(Debug, Clone)]
pub struct NativeSplitter {
    buffer_size: usize,
}

impl Default for NativeSplitter {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl NativeSplitter {
    /// Creates a splitter with the given copy buffer size.
    ///
    /// If `buffer_size` is 0, 1 MiB is used.
    pub fn new(buffer_size: usize) -> Self {
        let buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        Self { buffer_size }
    }
}

impl Splitter for NativeSplitter {
    fn split<'a>(
        &'a self,
        source: &'a Path,
        chunk_size: u64,
        dir: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send + 'a>> {
        let source = source.to_path_buf();
        let dir = dir.to_path_buf();
        let buffer_size = self.buffer_size;

        Box::pin(async move {
            let written = tokio::task::spawn_blocking(move || {
                split_blocking(&source, chunk_size, &dir, buffer_size)
            })
            .await
            .map_err(|e| TransferError::Partition(format!("split task failed: {e}")))??;

            debug!(chunks = written, "native split complete");
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "native"
    }
}

fn split_blocking(
    source: &Path,
    chunk_size: u64,
    dir: &Path,
    buffer_size: usize,
) -> Result<u64, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::Partition("chunk size must be positive".into()));
    }

    let mut input = File::open(source).map_err(fs_error(source))?;
    let total_size = input.metadata().map_err(fs_error(source))?.len();
    let chunk_count = total_size.div_ceil(chunk_size);
    let width = name_width(chunk_count);
    let mut buf = vec![0u8; buffer_size];

    for index in 1..=chunk_count {
        let path = dir.join(chunk_file_name(index, width));
        let file = File::create(&path).map_err(fs_error(&path))?;
        let mut out = BufWriter::new(file);

        let mut remaining = chunk_size.min(total_size - (index - 1) * chunk_size);
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = input.read(&mut buf[..want])?;
            if n == 0 {
                return Err(TransferError::Partition(format!(
                    "source shrank while splitting: {}",
                    source.display()
                )));
            }
            out.write_all(&buf[..n])?;
            remaining -= n as u64;
        }
        out.flush()?;
    }

    Ok(chunk_count)
}

// ---------------------------------------------------------------------------
// SplitCommand
// ---------------------------------------------------------------------------

/// Splits the source with the coreutils `split` tool.
#[derive(Debug, Clone)]
pub struct SplitCommand {
    program: PathBuf,
}

impl Default for SplitCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("split"),
        }
    }
}

impl SplitCommand {
    /// Uses `program` instead of `split` from `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Splitter for SplitCommand {
    fn split<'a>(
        &'a self,
        source: &'a Path,
        chunk_size: u64,
        dir: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransferError>> + Send + 'a>> {
        Box::pin(async move {
            let total_size = tokio::fs::metadata(source)
                .await
                .map_err(fs_error(source))?
                .len();
            let width = name_width(total_size.div_ceil(chunk_size.max(1)));

            let mut cmd = tokio::process::Command::new(&self.program);
            cmd.arg("-b")
                .arg(chunk_size.to_string())
                .arg("-d")
                .arg("-a")
                .arg(width.to_string())
                .arg(source)
                .arg(dir.join(CHUNK_FILE_PREFIX))
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let output = cmd.output().await.map_err(|e| {
                TransferError::Partition(format!(
                    "failed to run {}: {e}",
                    self.program.display()
                ))
            })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(TransferError::Partition(format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                )));
            }

            debug!(program = %self.program.display(), "split command complete");
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "split"
    }
}
