//! Release versions bundle
//!
//! A bundle pins every image and manifest a cluster is built from. The
//! provider only reads it: kube-distro images feed the control-plane
//! template, the `microvm` section locates the infrastructure manifests.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Bundle release sequence number
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Bundles {
    /// Monotonic release number
    pub number: i64,
}

/// Images and manifests for one Kubernetes version
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionsBundle {
    /// Kubernetes minor version the bundle targets
    #[serde(default)]
    pub kube_version: String,

    /// Kubernetes distribution images
    #[serde(default)]
    pub kube_distro: KubeDistro,

    /// EKS-D artifacts
    #[serde(default)]
    pub eks_d: EksDRelease,

    /// MicroVM provider artifacts
    #[serde(default)]
    pub microvm: MicrovmBundle,
}

/// Kubernetes distribution repository/tag pairs
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeDistro {
    /// Control plane component images
    pub kubernetes: VersionedRepository,
    /// CoreDNS image
    #[serde(rename = "coredns")]
    pub core_dns: VersionedRepository,
    /// Stacked etcd image
    pub etcd: VersionedRepository,
    /// Version of the external etcd binary
    #[serde(default)]
    pub etcd_version: String,
}

/// Image repository plus tag
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct VersionedRepository {
    /// Repository without tag
    pub repository: String,
    /// Tag
    pub tag: String,
}

/// EKS-D release artifacts
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EksDRelease {
    /// Node image used by kind-based bootstrap clusters
    #[serde(default)]
    pub kind_node: Image,
}

/// A container image
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Image {
    /// Asset name
    #[serde(default)]
    pub name: String,
    /// Fully qualified image reference
    #[serde(default)]
    pub uri: String,
}

impl Image {
    /// Image reference including tag
    pub fn versioned_image(&self) -> &str {
        &self.uri
    }
}

/// A release manifest
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Manifest {
    /// Download location
    pub uri: String,
}

/// MicroVM provider release artifacts
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MicrovmBundle {
    /// Provider version (e.g. "v0.2.2")
    pub version: String,
    /// infrastructure-components.yaml
    #[serde(default)]
    pub components: Manifest,
    /// metadata.yaml
    #[serde(default)]
    pub metadata: Manifest,
    /// cluster-template.yaml
    #[serde(default)]
    pub cluster_template: Manifest,
}

/// A bundle file as published by a release
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleRelease {
    /// Release sequence number
    pub number: i64,
    /// Versions bundle for the cluster's Kubernetes version
    pub versions_bundle: VersionsBundle,
}

impl BundleRelease {
    /// Sequence number wrapper used in cluster specs
    pub fn bundles(&self) -> Bundles {
        Bundles {
            number: self.number,
        }
    }
}

/// Decode a bundle release document
pub fn parse_bundle(content: &str) -> Result<BundleRelease> {
    serde_yaml::from_str(content)
        .map_err(|e| Error::serialization_for_kind("Bundles", format!("unable to decode bundle: {e}")))
}

/// Load a bundle release file
pub fn load_bundle(path: &Path) -> Result<BundleRelease> {
    let content =
        std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
    parse_bundle(&content)
}
