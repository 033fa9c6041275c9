//! MicrovmMachineConfig Custom Resource Definition
//!
//! Describes one class of microVM. Clusters reference machine configs by
//! name from their control-plane, worker, and etcd machine-group refs.

use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::annotations::{
    is_true, ProviderAnnotations, CONTROL_PLANE_ANNOTATION, ETCD_ANNOTATION,
    MANAGEMENT_ANNOTATION,
};
use super::{api_version, namespace_or_default, GenerateMetadata};
use crate::{Error, Result};

/// Kind of the machine config object
pub const MICROVM_MACHINE_CONFIG_KIND: &str = "MicrovmMachineConfig";

/// Operating system family of a machine class
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Ubuntu
    #[default]
    Ubuntu,
    /// Bottlerocket
    Bottlerocket,
    /// Red Hat Enterprise Linux
    Redhat,
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ubuntu => write!(f, "ubuntu"),
            Self::Bottlerocket => write!(f, "bottlerocket"),
            Self::Redhat => write!(f, "redhat"),
        }
    }
}

/// A user account provisioned on every machine of the class
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserConfiguration {
    /// Login name
    pub name: String,

    /// Public keys allowed to log in as this user
    #[serde(default)]
    pub ssh_authorized_keys: Vec<String>,
}

/// Desired state of a MicrovmMachineConfig
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "anywhere.eks.amazonaws.com",
    version = "v1alpha1",
    kind = "MicrovmMachineConfig",
    plural = "microvmmachineconfigs",
    status = "MicrovmMachineConfigStatus",
    namespaced
)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MicrovmMachineConfigSpec {
    /// Operating system family
    pub os_family: OsFamily,

    /// Ordered user accounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserConfiguration>,
}

/// Observed state of a MicrovmMachineConfig
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct MicrovmMachineConfigStatus {}

impl ProviderAnnotations for MicrovmMachineConfig {}

impl MicrovmMachineConfig {
    /// Kind every machine config document must carry
    pub fn expected_kind() -> &'static str {
        MICROVM_MACHINE_CONFIG_KIND
    }

    /// Mark this config as the control-plane machine class
    ///
    /// Does not check that no other config holds the role.
    pub fn set_control_plane(&mut self) {
        self.annotations_mut()
            .insert(CONTROL_PLANE_ANNOTATION.to_string(), "true".to_string());
    }

    /// True when this config is the control-plane machine class
    pub fn is_control_plane(&self) -> bool {
        is_true(self.annotations(), CONTROL_PLANE_ANNOTATION)
    }

    /// Mark this config as used for external etcd
    pub fn set_etcd(&mut self) {
        self.annotations_mut()
            .insert(ETCD_ANNOTATION.to_string(), "true".to_string());
    }

    /// True when this config is used for external etcd
    pub fn is_etcd(&self) -> bool {
        is_true(self.annotations(), ETCD_ANNOTATION)
    }

    /// Record the management cluster owning this config
    pub fn set_management(&mut self, cluster_name: &str) {
        self.annotations_mut()
            .insert(MANAGEMENT_ANNOTATION.to_string(), cluster_name.to_string());
    }

    /// True when owned by a management cluster
    ///
    /// An annotation holding the empty string counts as unset.
    pub fn is_management(&self) -> bool {
        self.managed_by().is_some_and(|c| !c.is_empty())
    }

    /// Raw managing-cluster annotation, `None` when never set
    pub fn managed_by(&self) -> Option<&str> {
        self.annotations()
            .get(MANAGEMENT_ANNOTATION)
            .map(String::as_str)
    }

    /// Operating system family
    pub fn os_family(&self) -> OsFamily {
        self.spec.os_family
    }

    /// First authorized key of the first user
    pub fn first_ssh_authorized_key(&self) -> Option<&str> {
        self.spec
            .users
            .first()
            .and_then(|u| u.ssh_authorized_keys.first())
            .map(String::as_str)
    }

    /// Validate that the config defines a user with at least one key
    ///
    /// Returns the first authorized key of the first user.
    pub fn validate_ssh_access(&self, cluster_name: &str) -> Result<&str> {
        let name = self.name_any();
        let user = self.spec.users.first().ok_or_else(|| {
            Error::validation_for_field(
                cluster_name,
                "spec.users",
                format!("machine config {name} must define at least one user"),
            )
        })?;
        user.ssh_authorized_keys
            .first()
            .map(String::as_str)
            .ok_or_else(|| {
                Error::validation_for_field(
                    cluster_name,
                    "spec.users[0].sshAuthorizedKeys",
                    format!(
                        "user {} in machine config {name} must define at least one ssh authorized key",
                        user.name
                    ),
                )
            })
    }

    /// Export projection used when writing user-facing config files
    ///
    /// Status is dropped and an empty namespace defaults to `default`.
    pub fn to_generate(&self) -> MicrovmMachineConfigGenerate {
        MicrovmMachineConfigGenerate {
            api_version: Self::api_version(&()).into_owned(),
            kind: Self::kind(&()).into_owned(),
            metadata: GenerateMetadata {
                name: self.name_any(),
                namespace: Some(namespace_or_default(self.metadata.namespace.as_deref())),
                annotations: self.annotations().clone(),
            },
            spec: self.spec.clone(),
        }
    }
}

/// Same as MicrovmMachineConfig, stripped down for YAML generation
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MicrovmMachineConfigGenerate {
    /// `group/version` of the object
    pub api_version: String,
    /// Object kind
    pub kind: String,
    /// Name, namespace, and annotations
    pub metadata: GenerateMetadata,
    /// Machine spec
    pub spec: MicrovmMachineConfigSpec,
}

impl MicrovmMachineConfigGenerate {
    /// Skeleton machine config named `name`
    pub fn new(name: &str) -> Self {
        Self {
            api_version: api_version(),
            kind: MICROVM_MACHINE_CONFIG_KIND.to_string(),
            metadata: GenerateMetadata::named(name),
            spec: MicrovmMachineConfigSpec {
                os_family: OsFamily::Ubuntu,
                users: vec![UserConfiguration {
                    name: "ubuntu".to_string(),
                    ssh_authorized_keys: vec!["ssh-rsa AAAA...".to_string()],
                }],
            },
        }
    }

    /// Serialize as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::serialization_for_kind(MICROVM_MACHINE_CONFIG_KIND, e.to_string()))
    }
}
