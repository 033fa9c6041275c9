//! Infrastructure provider abstraction layer
//!
//! The host framework drives every infrastructure provider through the
//! [`Provider`] lifecycle verbs. The MicroVM family ships one controller,
//! [`MicrovmProvider`], parameterised by a [`ProviderEdition`] that selects
//! the required environment and the release manifests.
//!
//! # Example
//!
//! ```text
//! let mut provider = create_provider(ProviderEdition::Flintlock, configs, client, clock, env);
//! provider.setup_and_validate_create_cluster(&spec).await?;
//! let capi = provider.generate_capi_spec_for_create(&cluster, &spec).await?;
//! ```

mod microvm;

pub use microvm::MicrovmProvider;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::client::{KubeCluster, ProviderKubectlClient};
use crate::constants::{HARDWARE_HOST_ENDPOINT_KEY, HOST_ENDPOINT_KEY};
use crate::upgrade::ComponentChangeDiff;
use microvm_common::bundle::{Manifest, MicrovmBundle};
use microvm_common::clock::Clock;
use microvm_common::crd::{Cluster, MicrovmDatacenterConfig, MicrovmMachineConfig};
use microvm_common::env::EnvStore;
use microvm_common::spec::ClusterSpec;
use microvm_common::{Error, Result};

/// Rendered Cluster API manifests for one cluster
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapiSpec {
    /// Control plane manifest
    pub control_plane: Vec<u8>,
    /// Worker manifest
    pub workers: Vec<u8>,
}

impl CapiSpec {
    /// True when neither manifest has content
    pub fn is_empty(&self) -> bool {
        self.control_plane.is_empty() && self.workers.is_empty()
    }
}

/// Release manifests the host installs for the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfrastructureBundle {
    /// Folder the manifests are stored under, with trailing slash
    pub folder_name: String,
    /// Manifests in install order
    pub manifests: Vec<Manifest>,
}

/// Setting applied to the bootstrap cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootstrapClusterOption {
    /// Environment for the bootstrap cluster's controllers
    Env(BTreeMap<String, String>),
}

/// Optional behaviors of a provider edition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Environment key the provisioning endpoint is published under
    pub endpoint_env_key: &'static str,
    /// Reject clusters where more than one machine config carries the control-plane flag
    pub enforce_single_control_plane: bool,
    /// Ship the provider's cluster-template manifest with the release bundle
    pub ships_cluster_template: bool,
}

/// Supported MicroVM provider variants
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderEdition {
    /// microVMs provisioned through a flintlock endpoint
    #[default]
    Flintlock,
    /// microVMs on bare-metal hosts exposed through a hardware endpoint
    BareMetal,
}

impl ProviderEdition {
    /// Capability set of the edition
    pub fn capabilities(self) -> ProviderCapabilities {
        match self {
            Self::Flintlock => ProviderCapabilities {
                endpoint_env_key: HOST_ENDPOINT_KEY,
                enforce_single_control_plane: false,
                ships_cluster_template: true,
            },
            Self::BareMetal => ProviderCapabilities {
                endpoint_env_key: HARDWARE_HOST_ENDPOINT_KEY,
                enforce_single_control_plane: false,
                ships_cluster_template: false,
            },
        }
    }

    /// Environment keys that must be set before any lifecycle verb runs
    pub fn required_env_keys(self) -> Vec<&'static str> {
        vec![self.capabilities().endpoint_env_key]
    }

    /// Release manifests for the edition, in install order
    pub fn manifests(self, bundle: &MicrovmBundle) -> Vec<Manifest> {
        let mut manifests = vec![bundle.components.clone(), bundle.metadata.clone()];
        if self.capabilities().ships_cluster_template {
            manifests.push(bundle.cluster_template.clone());
        }
        manifests
    }
}

impl fmt::Display for ProviderEdition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flintlock => write!(f, "flintlock"),
            Self::BareMetal => write!(f, "baremetal"),
        }
    }
}

impl FromStr for ProviderEdition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flintlock" => Ok(Self::Flintlock),
            "baremetal" | "bare-metal" => Ok(Self::BareMetal),
            other => Err(Error::validation(format!(
                "unknown provider edition: {other}, expected flintlock or baremetal"
            ))),
        }
    }
}

/// Reject more than one machine config flagged as control plane
pub fn validate_single_control_plane<'a>(
    cluster_name: &str,
    machine_configs: impl IntoIterator<Item = &'a MicrovmMachineConfig>,
) -> Result<()> {
    use kube::ResourceExt;

    let flagged: Vec<String> = machine_configs
        .into_iter()
        .filter(|m| m.is_control_plane())
        .map(|m| m.name_any())
        .collect();
    if flagged.len() > 1 {
        return Err(Error::validation_for(
            cluster_name,
            format!(
                "only one machine config may be used for the control plane, found {}",
                flagged.join(", ")
            ),
        ));
    }
    Ok(())
}

/// Configuration objects a provider instance is built from
#[derive(Clone, Debug)]
pub struct ProviderConfigs {
    /// The cluster object
    pub cluster: Cluster,
    /// The datacenter config
    pub datacenter: MicrovmDatacenterConfig,
    /// Machine configs keyed by name
    pub machines: BTreeMap<String, MicrovmMachineConfig>,
}

/// Lifecycle verbs the host framework invokes on an infrastructure provider
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name
    fn name(&self) -> &'static str;

    /// Resource type of the datacenter config
    fn datacenter_resource_type(&self) -> &'static str;

    /// Resource type of the machine config
    fn machine_resource_type(&self) -> &'static str;

    /// Settings for the bootstrap cluster
    fn bootstrap_cluster_opts(&self) -> Result<Vec<BootstrapClusterOption>>;

    /// Prepare the bootstrap cluster
    async fn bootstrap_setup(&self, cluster_config: &Cluster, cluster: &KubeCluster) -> Result<()>;

    /// Validate configuration and publish the environment for cluster creation
    ///
    /// Nothing is published when validation fails.
    async fn setup_and_validate_create_cluster(&mut self, spec: &ClusterSpec) -> Result<()>;

    /// Publish the environment for cluster deletion
    async fn setup_and_validate_delete_cluster(&self) -> Result<()>;

    /// Validate configuration for an upgrade
    async fn setup_and_validate_upgrade_cluster(
        &self,
        cluster: &KubeCluster,
        spec: &ClusterSpec,
    ) -> Result<()>;

    /// Refresh provider credentials on the target cluster
    async fn update_secrets(&self, cluster: &KubeCluster) -> Result<()>;

    /// Render the manifests for a new cluster
    async fn generate_capi_spec_for_create(
        &self,
        cluster: &KubeCluster,
        spec: &ClusterSpec,
    ) -> Result<CapiSpec>;

    /// Render the manifests for an upgrade
    async fn generate_capi_spec_for_upgrade(
        &self,
        bootstrap_cluster: &KubeCluster,
        workload_cluster: &KubeCluster,
        current_spec: &ClusterSpec,
        new_spec: &ClusterSpec,
    ) -> Result<CapiSpec>;

    /// Default storage class manifest, if the provider ships one
    fn generate_storage_class(&self) -> Option<Vec<u8>>;

    /// Machine health check manifest
    fn generate_mhc(&self) -> Result<Vec<u8>>;

    /// Rewrite a generated kubeconfig
    fn update_kube_config(&self, content: &mut Vec<u8>, cluster_name: &str) -> Result<()>;

    /// Provider version pinned by `spec`
    fn version(&self, spec: &ClusterSpec) -> String;

    /// Required environment, read back from the environment store
    fn env_map(&self) -> Result<BTreeMap<String, String>>;

    /// Controller deployments by namespace
    fn deployments(&self) -> BTreeMap<String, Vec<String>>;

    /// Release manifests for the provider
    fn infrastructure_bundle(&self, spec: &ClusterSpec) -> InfrastructureBundle;

    /// The datacenter config
    fn datacenter_config(&self) -> &MicrovmDatacenterConfig;

    /// Machine configs in use, flagged with their roles
    fn machine_configs(&mut self) -> Result<Vec<MicrovmMachineConfig>>;

    /// Validate a new spec against the running cluster
    async fn validate_new_spec(&self, cluster: &KubeCluster, spec: &ClusterSpec) -> Result<()>;

    /// Provider version change between two specs
    fn change_diff(&self, current: &ClusterSpec, new: &ClusterSpec) -> Option<ComponentChangeDiff>;

    /// Hook run after the control plane is upgraded
    async fn run_post_control_plane_upgrade(
        &self,
        old_spec: &ClusterSpec,
        new_spec: &ClusterSpec,
        workload_cluster: &KubeCluster,
        management_cluster: &KubeCluster,
    ) -> Result<()>;

    /// True when the provider itself needs upgrading
    async fn upgrade_needed(&self, old_spec: &ClusterSpec, new_spec: &ClusterSpec) -> Result<bool>;

    /// Hook run after the control plane is created
    async fn run_post_control_plane_creation(
        &self,
        spec: &ClusterSpec,
        cluster: &KubeCluster,
    ) -> Result<()>;

    /// Delete provider-owned resources
    async fn delete_resources(&self, spec: &ClusterSpec) -> Result<()>;
}

/// Create a provider instance for the given edition
pub fn create_provider(
    edition: ProviderEdition,
    configs: ProviderConfigs,
    client: Arc<dyn ProviderKubectlClient>,
    clock: Arc<dyn Clock>,
    env: Arc<dyn EnvStore>,
) -> Box<dyn Provider> {
    Box::new(MicrovmProvider::new(edition, configs, client, clock, env))
}
