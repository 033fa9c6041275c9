//! MicroVM provider CLI
//!
//! Loads declarative cluster configs and drives the MicroVM provider offline.

use clap::Parser;

use microvm_cli::Cli;
use microvm_common::telemetry::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig::with_filter(cli.log_level.as_str()))?;

    cli.run().await?;
    Ok(())
}
