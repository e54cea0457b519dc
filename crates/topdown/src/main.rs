//! Topdown CLI binary.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use topdown::cli::Cli;

/// Main entry point for the topdown CLI.
///
/// Uses tokio's current_thread runtime; every command is a short sequence
/// of file reads and writes.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so `--json` output on stdout stays parseable.
    // Example: RUST_LOG=topdown=debug,topdown_core=trace topdown history
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("topdown=info,topdown_core=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting topdown CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Topdown CLI completed successfully");
    Ok(())
}
