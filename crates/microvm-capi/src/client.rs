//! Orchestration client consumed by the provider
//!
//! The provider never talks to a cluster directly. The host framework hands
//! it a [`ProviderKubectlClient`] that applies manifests and waits on
//! deployments; tests substitute the generated mock.

use std::path::PathBuf;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use microvm_common::Result;

/// Handle to a running cluster the client can reach
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KubeCluster {
    /// Cluster name
    pub name: String,
    /// Kubeconfig used to reach the cluster
    pub kubeconfig_file: Option<PathBuf>,
}

impl KubeCluster {
    /// Handle for `name` with the given kubeconfig
    pub fn new(name: impl Into<String>, kubeconfig_file: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kubeconfig_file,
        }
    }
}

/// Cluster operations the provider relies on
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProviderKubectlClient: Send + Sync {
    /// Apply a rendered manifest to `cluster`
    async fn apply_kube_spec_from_bytes(&self, cluster: &KubeCluster, data: &[u8]) -> Result<()>;

    /// Block until `target` in `namespace` reports `condition` or `timeout` elapses
    async fn wait_for_deployment(
        &self,
        cluster: &KubeCluster,
        timeout: &str,
        condition: &str,
        target: &str,
        namespace: &str,
    ) -> Result<()>;
}
