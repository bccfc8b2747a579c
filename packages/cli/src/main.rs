use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use kvfs_cli::Args;
use kvfs_core::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cancel = CancellationToken::new();
    kvfs_cli::cancel_on_ctrl_c(cancel.clone());
    if let Some(secs) = args.timeout_secs {
        kvfs_cli::cancel_after(cancel.clone(), Duration::from_secs(secs));
    }

    let mut stdout = std::io::stdout().lock();
    match kvfs_cli::run(&args, &cancel, &mut stdout).await {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
