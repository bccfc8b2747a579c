//! The `kvfs` command-line tool.
//!
//! Opens a [`LocalDiskBackend`] data directory and runs one storage or lock
//! operation against it. The binary in `main.rs` only parses arguments,
//! installs logging and wires up cancellation.

use std::io::Write;
use std::time::Duration;

use kvfs_core::{CancellationToken, KvStorage, LocalDiskBackend};

mod args;
mod commands;
mod error;

pub use args::{Args, Command, StorageOptions};
pub use commands::{execute, Status};
pub use error::CliError;

/// Open the data directory named by `args` and run its command.
pub async fn run<W: Write>(
    args: &Args,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<Status, CliError> {
    let config = args.storage.storage_config()?;
    let dir = &args.storage.dir;
    let backend = LocalDiskBackend::create(dir).map_err(|source| CliError::Open {
        path: dir.clone(),
        source,
    })?;

    tracing::debug!(dir = %dir.display(), ?config, "Opened data directory");
    let storage = KvStorage::with_config(backend, config);
    execute(&storage, &args.command, cancel, out).await
}

/// Cancel `cancel` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    tracing::info!("Received CTRL+C, cancelling");
                    cancel.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "Cannot listen for CTRL+C"),
            },
        }
    });
}

/// Cancel `cancel` once `timeout` has elapsed.
pub fn cancel_after(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(?timeout, "Deadline exceeded, cancelling");
                cancel.cancel();
            }
        }
    });
}
