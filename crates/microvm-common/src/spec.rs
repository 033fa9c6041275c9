//! Cluster spec aggregate
//!
//! Everything a lifecycle call needs to know about one cluster: the cluster
//! object, its resolved versions bundle, and the optional identity configs.

use kube::ResourceExt;

use crate::bundle::{BundleRelease, Bundles, VersionsBundle};
use crate::crd::{AWSIamConfig, Cluster, OIDCConfig};

/// Resolved cluster specification
#[derive(Clone, Debug)]
pub struct ClusterSpec {
    /// The cluster object
    pub cluster: Cluster,
    /// Versions bundle matching the cluster's Kubernetes version
    pub versions_bundle: VersionsBundle,
    /// Bundle release sequence number
    pub bundles: Bundles,
    /// OIDC identity provider, if configured
    pub oidc_config: Option<OIDCConfig>,
    /// AWS IAM authenticator, if configured
    pub aws_iam_config: Option<AWSIamConfig>,
}

impl ClusterSpec {
    /// Spec for `cluster` built from a bundle release
    pub fn new(cluster: Cluster, release: BundleRelease) -> Self {
        Self {
            cluster,
            bundles: release.bundles(),
            versions_bundle: release.versions_bundle,
            oidc_config: None,
            aws_iam_config: None,
        }
    }

    /// Attach an OIDC config
    pub fn with_oidc_config(mut self, config: Option<OIDCConfig>) -> Self {
        self.oidc_config = config;
        self
    }

    /// Attach an AWS IAM config
    pub fn with_aws_iam_config(mut self, config: Option<AWSIamConfig>) -> Self {
        self.aws_iam_config = config;
        self
    }

    /// Cluster name
    pub fn name(&self) -> String {
        self.cluster.name_any()
    }

    /// Kubernetes version requested by the cluster object
    pub fn kubernetes_version(&self) -> &str {
        &self.cluster.spec.kubernetes_version
    }

    /// Bundle release sequence number
    pub fn bundle_number(&self) -> i64 {
        self.bundles.number
    }

    /// Version of the MicroVM provider in the bundle
    pub fn microvm_version(&self) -> &str {
        &self.versions_bundle.microvm.version
    }
}
