//! Execution of parsed commands against a storage.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use bytes::Bytes;
use kvfs_core::{CancellationToken, Error, KvBackend, KvStorage, Storage};
use tokio::io::AsyncReadExt;

use crate::{CliError, Command};

/// Exit status of a command that ran to completion.
pub type Status = u8;

/// Run `command` against `storage`, writing its output to `out`.
///
/// Returns the process exit status for commands that report one
/// (`exists`, `run-locked`); everything else succeeds with 0.
pub async fn execute<B, W>(
    storage: &KvStorage<B>,
    command: &Command,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<Status, CliError>
where
    B: KvBackend + ?Sized,
    W: Write,
{
    match command {
        Command::Store { key, file } => {
            let value = read_input(file.as_deref()).await?;
            storage.store(cancel, key, value).await?;
        }
        Command::Load { key } => {
            let value = storage.load(cancel, key).await?;
            out.write_all(&value)
                .and_then(|()| out.flush())
                .map_err(|e| CliError::io("writing stdout", e))?;
        }
        Command::Delete { key } => {
            storage.delete(cancel, key).await?;
        }
        Command::Exists { key } => {
            let exists = storage.exists(cancel, key).await;
            writeln!(out, "{}", exists).map_err(|e| CliError::io("writing stdout", e))?;
            return Ok(if exists { 0 } else { 1 });
        }
        Command::Stat { key } => {
            let info = storage.stat(cancel, key).await?;
            serde_json::to_writer_pretty(&mut *out, &info)?;
            writeln!(out).map_err(|e| CliError::io("writing stdout", e))?;
        }
        Command::List { path, recursive } => {
            let mut keys = storage.list(cancel, path, *recursive).await?;
            keys.sort();
            for key in keys {
                writeln!(out, "{}", key).map_err(|e| CliError::io("writing stdout", e))?;
            }
        }
        Command::Lock { name } => {
            storage.lock(cancel, name).await?;
        }
        Command::Unlock { name } => {
            storage.unlock(cancel, name).await?;
        }
        Command::RunLocked { name, command } => {
            let status = storage
                .locker()
                .with_lock(cancel, name, || async {
                    Ok(run_child(cancel, command).await)
                })
                .await??;
            return Ok(status);
        }
    }
    Ok(0)
}

async fn read_input(file: Option<&Path>) -> Result<Bytes, CliError> {
    match file {
        Some(path) => tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|e| CliError::io(format!("reading {}", path.display()), e)),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .map_err(|e| CliError::io("reading stdin", e))?;
            Ok(Bytes::from(buf))
        }
    }
}

/// Run `argv` to completion, killing it if `cancel` fires first.
async fn run_child(cancel: &CancellationToken, argv: &[String]) -> Result<Status, CliError> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(0);
    };

    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CliError::Spawn {
            program: program.clone(),
            source: e,
        })?;

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(program = %program, "Cancelled, killing child");
            if let Err(e) = child.kill().await {
                tracing::warn!(program = %program, error = %e, "Failed to kill child");
            }
            return Err(Error::Cancelled.into());
        }
        status = child.wait() => status.map_err(|e| CliError::io(format!("waiting for {}", program), e))?,
    };

    tracing::debug!(program = %program, status = %status, "Child exited");
    // Death by signal has no code.
    Ok(status
        .code()
        .map_or(1, |code| Status::try_from(code).unwrap_or(1)))
}
