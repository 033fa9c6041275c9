//! MicroVM provider CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// microvm - drive the MicroVM infrastructure provider from config files
#[derive(Parser, Debug)]
#[command(name = "microvm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info", env = "MICROVM_LOG")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate skeleton configs or Cluster API manifests
    Generate(commands::generate::GenerateArgs),
    /// Compare two cluster configs and report which templates need regenerating
    Diff(commands::diff::DiffArgs),
    /// Validate a cluster config and print the provider environment
    Env(commands::env::EnvArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Generate(args) => commands::generate::run(args).await,
            Commands::Diff(args) => commands::diff::run(args).await,
            Commands::Env(args) => commands::env::run(args).await,
        }
    }
}
