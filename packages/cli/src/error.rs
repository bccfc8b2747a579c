use std::io;
use std::path::PathBuf;

use kvfs_core::KvError;
use thiserror::Error;

/// Everything that can make the `kvfs` binary fail.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Storage(#[from] kvfs_core::Error),

    #[error("cannot open data directory {path}: {source}")]
    Open { path: PathBuf, source: KvError },

    #[error("invalid config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("{context}: {source}")]
    Io { context: String, source: io::Error },

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("command {program:?} could not be started: {source}")]
    Spawn { program: String, source: io::Error },
}

impl CliError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        CliError::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status: 2 for a missing key, 1 for anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Storage(e) if e.is_not_found() => 2,
            _ => 1,
        }
    }
}
