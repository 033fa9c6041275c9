//! MicrovmDatacenterConfig Custom Resource Definition
//!
//! Identifies the flintlock provisioning endpoint a cluster's microVMs are
//! scheduled on. One instance exists per cluster.

use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::annotations::ProviderAnnotations;
use super::{api_version, namespace_or_default, GenerateMetadata};
use crate::{Error, Result};

/// Kind of the datacenter config object
pub const MICROVM_DATACENTER_KIND: &str = "MicrovmDatacenterConfig";

/// Desired state of a MicrovmDatacenterConfig
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "anywhere.eks.amazonaws.com",
    version = "v1alpha1",
    kind = "MicrovmDatacenterConfig",
    plural = "microvmdatacenterconfigs",
    status = "MicrovmDatacenterConfigStatus",
    namespaced
)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MicrovmDatacenterConfigSpec {
    /// Address of the flintlock provisioning endpoint
    #[serde(rename = "flintlockURL")]
    pub flintlock_url: String,

    /// Proxy used to reach the microVM hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microvm_proxy: Option<String>,

    /// Default SSH key reference for provisioned machines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
}

/// Observed status of a MicrovmDatacenterConfig
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct MicrovmDatacenterConfigStatus {}

impl ProviderAnnotations for MicrovmDatacenterConfig {}

impl MicrovmDatacenterConfig {
    /// Kind every datacenter config document must carry
    pub fn expected_kind() -> &'static str {
        MICROVM_DATACENTER_KIND
    }

    /// Validate the datacenter configuration
    pub fn validate(&self) -> Result<()> {
        if self.spec.flintlock_url.trim().is_empty() {
            return Err(Error::validation_for_field(
                self.name_any(),
                "spec.flintlockURL",
                "flintlockURL is required",
            ));
        }
        Ok(())
    }

    /// Export projection used when writing user-facing config files
    ///
    /// Status is dropped and an empty namespace defaults to `default`.
    pub fn to_generate(&self) -> MicrovmDatacenterConfigGenerate {
        MicrovmDatacenterConfigGenerate {
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

/// Same as MicrovmDatacenterConfig, stripped down for YAML generation
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MicrovmDatacenterConfigGenerate {
    /// `group/version` of the object
    pub api_version: String,
    /// Object kind
    pub kind: String,
    /// Name, namespace, and annotations
    pub metadata: GenerateMetadata,
    /// Datacenter spec
    pub spec: MicrovmDatacenterConfigSpec,
}

impl MicrovmDatacenterConfigGenerate {
    /// Skeleton datacenter config for `cluster_name`
    pub fn new(cluster_name: &str) -> Self {
        Self {
            api_version: api_version(),
            kind: MICROVM_DATACENTER_KIND.to_string(),
            metadata: GenerateMetadata::named(cluster_name),
            spec: MicrovmDatacenterConfigSpec::default(),
        }
    }

    /// Serialize as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::serialization_for_kind(MICROVM_DATACENTER_KIND, e.to_string()))
    }
}
