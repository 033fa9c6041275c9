//! Cluster Custom Resource Definition
//!
//! The framework-level cluster object. Only the fields the MicroVM provider
//! reads are modelled; unknown fields are tolerated so full cluster configs
//! written for other providers still decode.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of the cluster object
pub const CLUSTER_KIND: &str = "Cluster";

/// Desired state of a Cluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "anywhere.eks.amazonaws.com",
    version = "v1alpha1",
    kind = "Cluster",
    plural = "clusters",
    status = "ClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfigSpec {
    /// Kubernetes minor version (e.g. "1.27")
    pub kubernetes_version: String,

    /// Control plane nodes
    pub control_plane_configuration: ControlPlaneConfiguration,

    /// Worker node groups, in declaration order
    #[serde(default)]
    pub worker_node_group_configurations: Vec<WorkerNodeGroupConfiguration>,

    /// Dedicated etcd nodes; stacked etcd when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_etcd_configuration: Option<ExternalEtcdConfiguration>,

    /// Reference to the datacenter config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter_ref: Option<Ref>,

    /// Pod and service networks
    #[serde(default)]
    pub cluster_network: ClusterNetwork,

    /// Outbound proxy used by cluster components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_configuration: Option<ProxyConfiguration>,

    /// Pod IAM (IRSA) settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_iam_config: Option<PodIamConfig>,

    /// Cluster managing this one; self-managed when absent or self-referencing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_cluster: Option<ManagementCluster>,
}

/// Observed state of a Cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ClusterStatus {}

/// Control plane node configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneConfiguration {
    /// Number of control plane nodes
    pub count: i32,

    /// API server endpoint
    #[serde(default)]
    pub endpoint: Endpoint,

    /// Machine config used by the control plane nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_group_ref: Option<Ref>,

    /// Taints applied to the control plane nodes, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

/// Network endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Endpoint {
    /// Host address (IP or DNS name)
    pub host: String,
}

/// Name-based reference to another configuration object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Ref {
    /// Kind of the referenced object
    #[serde(default)]
    pub kind: String,
    /// Name of the referenced object
    pub name: String,
}

/// Worker node group
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerNodeGroupConfiguration {
    /// Group name
    #[serde(default)]
    pub name: String,

    /// Number of nodes
    pub count: i32,

    /// Machine config used by the group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_group_ref: Option<Ref>,
}

/// Dedicated etcd node configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEtcdConfiguration {
    /// Number of etcd nodes
    pub count: i32,

    /// Machine config used by the etcd nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_group_ref: Option<Ref>,
}

/// Cluster networks
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ClusterNetwork {
    /// Pod network
    #[serde(default)]
    pub pods: CidrBlocks,
    /// Service network
    #[serde(default)]
    pub services: CidrBlocks,
}

/// Ordered list of CIDR blocks
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CidrBlocks {
    /// CIDR blocks
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

/// Outbound proxy settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfiguration {
    /// HTTP proxy URL
    #[serde(default)]
    pub http_proxy: String,
    /// HTTPS proxy URL
    #[serde(default)]
    pub https_proxy: String,
    /// Destinations bypassing the proxy
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

/// Pod IAM settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodIamConfig {
    /// Issuer URL stamped into service account tokens
    pub service_account_issuer: String,
}

/// Reference to the managing cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ManagementCluster {
    /// Name of the managing cluster
    pub name: String,
}

/// Node taint
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Taint {
    /// Taint key
    pub key: String,
    /// Taint value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Scheduling effect
    pub effect: TaintEffect,
}

/// Scheduling effect of a taint
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum TaintEffect {
    /// Do not schedule new pods
    NoSchedule,
    /// Avoid scheduling new pods
    PreferNoSchedule,
    /// Evict running pods
    NoExecute,
}

impl Cluster {
    /// Name of the managing cluster, if one is configured
    pub fn management_cluster_name(&self) -> Option<&str> {
        self.spec
            .management_cluster
            .as_ref()
            .map(|m| m.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// True when a different cluster manages this one
    pub fn is_managed(&self) -> bool {
        let name = self.name_any();
        self.management_cluster_name()
            .is_some_and(|mgmt| mgmt != name)
    }

    /// Name of the control plane machine config
    pub fn control_plane_machine_ref(&self) -> Option<&str> {
        self.spec
            .control_plane_configuration
            .machine_group_ref
            .as_ref()
            .map(|r| r.name.as_str())
    }

    /// First worker node group
    ///
    /// Only the first group is provisioned by this provider.
    pub fn first_worker_group(&self) -> Option<&WorkerNodeGroupConfiguration> {
        self.spec.worker_node_group_configurations.first()
    }

    /// Name of the machine config of the first worker node group
    pub fn worker_machine_ref(&self) -> Option<&str> {
        self.first_worker_group()
            .and_then(|g| g.machine_group_ref.as_ref())
            .map(|r| r.name.as_str())
    }

    /// Name of the external etcd machine config
    pub fn etcd_machine_ref(&self) -> Option<&str> {
        self.spec
            .external_etcd_configuration
            .as_ref()
            .and_then(|e| e.machine_group_ref.as_ref())
            .map(|r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(name: &str, management: Option<&str>) -> Cluster {
        Cluster::new(
            name,
            ClusterConfigSpec {
                kubernetes_version: "1.27".to_string(),
                management_cluster: management.map(|m| ManagementCluster {
                    name: m.to_string(),
                }),
                ..Default::default()
            },
        )
    }

    mod management {
        use super::*;

        #[test]
        fn test_no_management_cluster_is_self_managed() {
            let c = cluster("test1", None);
            assert!(!c.is_managed());
            assert_eq!(c.management_cluster_name(), None);
        }

        #[test]
        fn test_self_reference_is_self_managed() {
            assert!(!cluster("test1", Some("test1")).is_managed());
        }

        #[test]
        fn test_empty_name_is_self_managed() {
            let c = cluster("test1", Some(""));
            assert!(!c.is_managed());
            assert_eq!(c.management_cluster_name(), None);
        }

        #[test]
        fn test_other_cluster_manages() {
            let c = cluster("workload", Some("mgmt"));
            assert!(c.is_managed());
            assert_eq!(c.management_cluster_name(), Some("mgmt"));
        }
    }

    mod refs {
        use super::*;

        #[test]
        fn test_machine_refs() {
            let mut c = cluster("test1", None);
            c.spec.control_plane_configuration.machine_group_ref = Some(Ref {
                kind: "MicrovmMachineConfig".to_string(),
                name: "cp-1".to_string(),
            });
            c.spec.worker_node_group_configurations = vec![
                WorkerNodeGroupConfiguration {
                    name: "md-0".to_string(),
                    count: 3,
                    machine_group_ref: Some(Ref {
                        kind: "MicrovmMachineConfig".to_string(),
                        name: "worker-1".to_string(),
                    }),
                },
                WorkerNodeGroupConfiguration {
                    name: "md-1".to_string(),
                    count: 1,
                    machine_group_ref: None,
                },
            ];

            assert_eq!(c.control_plane_machine_ref(), Some("cp-1"));
            assert_eq!(c.worker_machine_ref(), Some("worker-1"));
            assert_eq!(c.first_worker_group().map(|g| g.count), Some(3));
            assert_eq!(c.etcd_machine_ref(), None);
        }

        #[test]
        fn test_missing_refs() {
            let c = cluster("test1", None);
            assert_eq!(c.control_plane_machine_ref(), None);
            assert_eq!(c.worker_machine_ref(), None);
            assert!(c.first_worker_group().is_none());
        }
    }

    #[test]
    fn test_decodes_cluster_yaml() {
        let yaml = r#"
kubernetesVersion: "1.27"
controlPlaneConfiguration:
  count: 3
  endpoint:
    host: 10.10.0.2
  machineGroupRef:
    kind: MicrovmMachineConfig
    name: cp-1
  taints:
    - key: node-role
      effect: NoSchedule
workerNodeGroupConfigurations:
  - name: md-0
    count: 2
clusterNetwork:
  cni: cilium
  pods:
    cidrBlocks: ["192.168.0.0/16"]
  services:
    cidrBlocks: ["10.96.0.0/12"]
"#;
        let spec: ClusterConfigSpec = serde_yaml::from_str(yaml).expect("cluster spec should decode");
        assert_eq!(spec.control_plane_configuration.count, 3);
        assert_eq!(spec.control_plane_configuration.endpoint.host, "10.10.0.2");
        assert_eq!(
            spec.control_plane_configuration.taints,
            vec![Taint {
                key: "node-role".to_string(),
                value: None,
                effect: TaintEffect::NoSchedule,
            }]
        );
        assert_eq!(spec.cluster_network.pods.cidr_blocks, vec!["192.168.0.0/16"]);
        assert!(spec.external_etcd_configuration.is_none());
    }
}
