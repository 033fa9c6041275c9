//! CLI commands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use tracing::debug;

use microvm_capi::{
    create_provider, KubeCluster, Provider, ProviderConfigs, ProviderEdition, ProviderKubectlClient,
};
use microvm_common::bundle::load_bundle;
use microvm_common::clock::SystemClock;
use microvm_common::crd::loader::{
    parse_aws_iam_config, parse_cluster, parse_datacenter_config, parse_machine_configs,
    parse_oidc_config, read_file,
};
use microvm_common::env::EnvStore;
use microvm_common::spec::ClusterSpec;

use crate::Result;

pub mod diff;
pub mod env;
pub mod generate;

/// Config file and bundle every provider-driving command needs
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Multi-document cluster config (Cluster, datacenter and machine configs)
    #[arg(long, env = "MICROVM_CLUSTER_CONFIG")]
    pub cluster_config: PathBuf,

    /// Versions bundle release file
    #[arg(long, env = "MICROVM_BUNDLE")]
    pub bundle: PathBuf,

    /// Provider edition (flintlock or baremetal)
    #[arg(long, default_value = "flintlock")]
    pub edition: ProviderEdition,
}

/// Everything loaded from a cluster config file and its bundle
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub configs: ProviderConfigs,
    pub spec: ClusterSpec,
}

/// Load the cluster spec from a config file and bundle
pub fn load_spec(cluster_config: &Path, bundle: &Path) -> Result<ClusterSpec> {
    spec_from_content(&read_file(cluster_config)?, bundle)
}

fn spec_from_content(content: &str, bundle: &Path) -> Result<ClusterSpec> {
    let cluster = parse_cluster(content)?;
    let release = load_bundle(bundle)?;
    Ok(ClusterSpec::new(cluster, release)
        .with_oidc_config(parse_oidc_config(content)?)
        .with_aws_iam_config(parse_aws_iam_config(content)?))
}

/// Load provider configs and the cluster spec
pub fn load_config(args: &ConfigArgs) -> Result<LoadedConfig> {
    let content = read_file(&args.cluster_config)?;
    let spec = spec_from_content(&content, &args.bundle)?;
    let configs = ProviderConfigs {
        cluster: spec.cluster.clone(),
        datacenter: parse_datacenter_config(&content)?,
        machines: parse_machine_configs(&content)?,
    };
    debug!(
        cluster = %spec.name(),
        machines = configs.machines.len(),
        bundle = spec.bundle_number(),
        "loaded cluster config"
    );
    Ok(LoadedConfig { configs, spec })
}

/// Build a provider that never reaches a live cluster
pub fn offline_provider(
    edition: ProviderEdition,
    configs: ProviderConfigs,
    env: Arc<dyn EnvStore>,
) -> Box<dyn Provider> {
    create_provider(
        edition,
        configs,
        Arc::new(OfflineClient),
        Arc::new(SystemClock),
        env,
    )
}

/// Kubectl client for commands that only render and validate
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineClient;

#[async_trait]
impl ProviderKubectlClient for OfflineClient {
    async fn apply_kube_spec_from_bytes(
        &self,
        cluster: &KubeCluster,
        _data: &[u8],
    ) -> microvm_common::Result<()> {
        Err(offline(cluster))
    }

    async fn wait_for_deployment(
        &self,
        cluster: &KubeCluster,
        _timeout: &str,
        _condition: &str,
        _target: &str,
        _namespace: &str,
    ) -> microvm_common::Result<()> {
        Err(offline(cluster))
    }
}

fn offline(cluster: &KubeCluster) -> microvm_common::Error {
    microvm_common::Error::provider_for(
        cluster.name.as_str(),
        "no cluster connection available in offline mode",
    )
}
