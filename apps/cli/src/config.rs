//! CLI configuration file.
//!
//! Optional JSON file, looked up at:
//! - Linux: `~/.config/vaultpush/config.json`
//! - Windows: `%APPDATA%/vaultpush/config.json`
//!
//! Every field has a default; command-line flags override file values.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Values read from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// `aws` executable.
    #[serde(default = "default_aws_bin")]
    pub aws_bin: String,

    /// Vault owner account; `-` means the caller's own account.
    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Parent directory for per-file working directories (system temp by default).
    #[serde(default)]
    pub work_root: Option<PathBuf>,

    /// Concurrent part uploads (CPU count by default).
    #[serde(default)]
    pub parallelism: Option<usize>,

    /// Part size with optional `k`/`m`/`g` suffix.
    #[serde(default)]
    pub part_size: Option<String>,

    /// Split with the coreutils `split` tool instead of in process.
    #[serde(default)]
    pub use_split_command: bool,

    #[serde(default)]
    pub verify_part_checksums: bool,

    #[serde(default)]
    pub cleanup_on_failure: bool,
}

fn default_aws_bin() -> String {
    "aws".into()
}

fn default_account_id() -> String {
    "-".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws_bin: default_aws_bin(),
            account_id: default_account_id(),
            profile: None,
            region: None,
            work_root: None,
            parallelism: None,
            part_size: None,
            use_split_command: false,
            verify_part_checksums: false,
            cleanup_on_failure: false,
        }
    }
}

impl Config {
    /// Loads `explicit` if given, otherwise the default config path.
    ///
    /// A missing default file yields defaults; a missing explicit file is
    /// an error. Unparsable content is logged and replaced by defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let path = config_path()?;
                if !path.exists() {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    return Ok(Config::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Config>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Config::default())
            }
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_base_dir()?.join("vaultpush").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home).join(".config"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp"))
    }
}
