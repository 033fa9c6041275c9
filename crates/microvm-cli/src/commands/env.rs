//! Env command
//!
//! Runs create validation against an in-memory environment and prints what
//! the provider publishes for the host framework.

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Args;

use microvm_capi::BootstrapClusterOption;
use microvm_common::env::MemoryEnv;

use super::{load_config, offline_provider, ConfigArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct EnvArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Also print the bootstrap cluster proxy environment
    #[arg(long)]
    pub bootstrap: bool,
}

pub async fn run(args: EnvArgs) -> Result<()> {
    for (key, value) in provider_env(&args).await? {
        println!("{key}={value}");
    }
    Ok(())
}

/// Environment the provider requires, plus the bootstrap env when requested
pub async fn provider_env(args: &EnvArgs) -> Result<BTreeMap<String, String>> {
    let loaded = load_config(&args.config)?;
    let mut provider = offline_provider(
        args.config.edition,
        loaded.configs,
        Arc::new(MemoryEnv::new()),
    );
    provider.setup_and_validate_create_cluster(&loaded.spec).await?;

    let mut env = provider.env_map()?;
    if args.bootstrap {
        for option in provider.bootstrap_cluster_opts()? {
            match option {
                BootstrapClusterOption::Env(vars) => env.extend(vars),
            }
        }
    }
    Ok(env)
}
