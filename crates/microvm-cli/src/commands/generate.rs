//! Generate command
//!
//! `generate clusterconfig` prints skeleton provider configs for a new
//! cluster. `generate capi` validates a cluster config and renders its
//! Cluster API manifests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Subcommand};
use tracing::info;

use microvm_capi::{CapiSpec, KubeCluster};
use microvm_common::crd::{MicrovmDatacenterConfigGenerate, MicrovmMachineConfigGenerate};
use microvm_common::env::MemoryEnv;
use microvm_common::YAML_SEPARATOR;

use super::{load_config, offline_provider, ConfigArgs};
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(subcommand)]
    pub target: GenerateTarget,
}

#[derive(Subcommand, Debug)]
pub enum GenerateTarget {
    /// Print skeleton datacenter and machine configs
    Clusterconfig(ClusterConfigArgs),
    /// Render the control plane and worker manifests
    Capi(CapiArgs),
}

#[derive(Args, Debug)]
pub struct ClusterConfigArgs {
    /// Cluster name
    pub name: String,
}

#[derive(Args, Debug)]
pub struct CapiArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory to write manifests into (stdout when omitted)
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,
}

pub async fn run(args: GenerateArgs) -> Result<()> {
    match args.target {
        GenerateTarget::Clusterconfig(args) => {
            print!("{}", cluster_config_skeleton(&args.name)?);
            Ok(())
        }
        GenerateTarget::Capi(args) => {
            let (name, capi) = render_capi(&args.config).await?;
            match args.output_dir {
                Some(dir) => {
                    for path in write_capi(&dir, &name, &capi)? {
                        println!("wrote {}", path.display());
                    }
                }
                None => {
                    print!("{}", String::from_utf8_lossy(&capi.control_plane));
                    print!("{YAML_SEPARATOR}");
                    print!("{}", String::from_utf8_lossy(&capi.workers));
                }
            }
            Ok(())
        }
    }
}

/// Skeleton datacenter config plus one machine config for control plane and workers
pub fn cluster_config_skeleton(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::validation("cluster name is required"));
    }
    let documents = [
        MicrovmDatacenterConfigGenerate::new(name).to_yaml()?,
        MicrovmMachineConfigGenerate::new(&format!("{name}-cp")).to_yaml()?,
        MicrovmMachineConfigGenerate::new(name).to_yaml()?,
    ];
    Ok(documents.join("---\n"))
}

/// Validate the config and render its manifests, returning the cluster name
pub async fn render_capi(config: &ConfigArgs) -> Result<(String, CapiSpec)> {
    let loaded = load_config(config)?;
    let name = loaded.spec.name();
    let mut provider = offline_provider(config.edition, loaded.configs, Arc::new(MemoryEnv::new()));

    provider.setup_and_validate_create_cluster(&loaded.spec).await?;
    let capi = provider
        .generate_capi_spec_for_create(&KubeCluster::new(name.as_str(), None), &loaded.spec)
        .await?;
    info!(cluster = %name, edition = %config.edition, "rendered cluster api manifests");
    Ok((name, capi))
}

/// Write both manifests into `dir`, returning the written paths
pub fn write_capi(dir: &Path, name: &str, capi: &CapiSpec) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| Error::write(dir, e))?;
    let files = [
        (dir.join(format!("{name}-control-plane.yaml")), &capi.control_plane),
        (dir.join(format!("{name}-workers.yaml")), &capi.workers),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (path, content) in files {
        std::fs::write(&path, content).map_err(|e| Error::write(&path, e))?;
        written.push(path);
    }
    Ok(written)
}
