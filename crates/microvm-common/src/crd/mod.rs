//! Configuration objects for the MicroVM provider
//!
//! These are the declarative, versioned objects a user supplies: the
//! datacenter endpoint, the machine classes, the cluster itself, and the
//! optional identity configs. Provider state is tracked as annotations on
//! the objects, see [`annotations`].

pub mod annotations;
mod cluster;
mod datacenter;
mod identity;
pub mod loader;
mod machine;

pub use annotations::{
    ProviderAnnotations, ProviderFlags, CONTROL_PLANE_ANNOTATION, ETCD_ANNOTATION,
    MANAGEMENT_ANNOTATION, PAUSED_ANNOTATION,
};
pub use cluster::{
    CidrBlocks, Cluster, ClusterConfigSpec, ClusterNetwork, ClusterStatus,
    ControlPlaneConfiguration, Endpoint, ExternalEtcdConfiguration, ManagementCluster,
    PodIamConfig, ProxyConfiguration, Ref, Taint, TaintEffect, WorkerNodeGroupConfiguration,
    CLUSTER_KIND,
};
pub use datacenter::{
    MicrovmDatacenterConfig, MicrovmDatacenterConfigGenerate, MicrovmDatacenterConfigSpec,
    MicrovmDatacenterConfigStatus, MICROVM_DATACENTER_KIND,
};
pub use identity::{
    AWSIamConfig, AwsIamConfigSpec, OIDCConfig, OidcConfigSpec, OidcRequiredClaim,
};
pub use machine::{
    MicrovmMachineConfig, MicrovmMachineConfigGenerate, MicrovmMachineConfigSpec,
    MicrovmMachineConfigStatus, OsFamily, UserConfiguration, MICROVM_MACHINE_CONFIG_KIND,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stripped-down metadata used when exporting objects as user-facing YAML
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMetadata {
    /// Object name
    pub name: String,

    /// Object namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Annotations carried over from the source object
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl GenerateMetadata {
    /// Metadata carrying only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Full `group/version` string of the configuration API
pub fn api_version() -> String {
    format!("{}/{}", crate::API_GROUP, crate::API_VERSION)
}

/// Resolve an export namespace, falling back to [`crate::DEFAULT_NAMESPACE`]
pub(crate) fn namespace_or_default(namespace: Option<&str>) -> String {
    namespace
        .filter(|ns| !ns.is_empty())
        .unwrap_or(crate::DEFAULT_NAMESPACE)
        .to_string()
}
