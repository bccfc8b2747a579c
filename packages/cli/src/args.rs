//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kvfs_core::StorageConfig;

use crate::CliError;

/// kvfs - files, directories and locks on a key-value store
///
/// Keys are slash-separated paths. Storing `a/b/c` makes `a` and `a/b`
/// visible as directories. Locks are named and shared by every process
/// using the same data directory and lock prefix.
#[derive(Parser, Debug)]
#[command(name = "kvfs", version, about)]
pub struct Args {
    #[command(flatten)]
    pub storage: StorageOptions,

    /// Give up and cancel the command after this many seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Enable verbose logging.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the key space lives and how locks behave.
#[derive(clap::Args, Debug, Clone)]
pub struct StorageOptions {
    /// Data directory.
    #[arg(long, env = "KVFS_DIR", default_value = "./kvfs-data", global = true)]
    pub dir: PathBuf,

    /// JSON file with storage settings; the flags below override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Prefix turning a lock name into its key.
    #[arg(long, global = true)]
    pub lock_prefix: Option<String>,

    /// Age in seconds after which a held lock is taken over.
    #[arg(long, global = true)]
    pub stale_after_secs: Option<u64>,

    /// Wait in milliseconds between attempts on a held lock.
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,
}

impl StorageOptions {
    /// Resolve the effective configuration: defaults, then the config
    /// file, then individual flags.
    pub fn storage_config(&self) -> Result<StorageConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| CliError::io(format!("reading {}", path.display()), e))?;
                StorageConfig::from_json(&text).map_err(|e| CliError::Config {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            None => StorageConfig::default(),
        };

        if let Some(prefix) = &self.lock_prefix {
            config = config.with_lock_prefix(prefix.clone());
        }
        if let Some(secs) = self.stale_after_secs {
            config = config.with_stale_after(Duration::from_secs(secs));
        }
        if let Some(ms) = self.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Store FILE (or stdin) at KEY, creating parent directories
    Store {
        key: String,
        file: Option<PathBuf>,
    },

    /// Write the contents of KEY to stdout
    Load { key: String },

    /// Delete a file, or a directory and everything beneath it
    Delete { key: String },

    /// Print whether KEY exists; exits 1 when it does not
    Exists { key: String },

    /// Print metadata for KEY as JSON
    Stat { key: String },

    /// List keys beneath PATH, one per line
    List {
        path: String,

        /// Include every descendant, not just direct children
        #[arg(short, long)]
        recursive: bool,
    },

    /// Acquire a named lock and leave it held
    Lock { name: String },

    /// Release a named lock
    Unlock { name: String },

    /// Run a command while holding a named lock
    RunLocked {
        name: String,

        /// Command and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}
