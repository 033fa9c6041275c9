//! Identity provider configuration objects
//!
//! Optional OIDC and AWS IAM authenticator configs referenced by a cluster.
//! Both only shape API server flags.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of an OIDCConfig
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "anywhere.eks.amazonaws.com",
    version = "v1alpha1",
    kind = "OIDCConfig",
    plural = "oidcconfigs",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfigSpec {
    /// Client ID tokens must be issued for
    #[serde(default)]
    pub client_id: String,
    /// JWT claim holding the user's groups
    #[serde(default)]
    pub groups_claim: String,
    /// Prefix prepended to group claims
    #[serde(default)]
    pub groups_prefix: String,
    /// Issuer URL of the provider
    #[serde(default, rename = "issuerUrl")]
    pub issuer_url: String,
    /// Claims the ID token must carry
    #[serde(default)]
    pub required_claims: Vec<OidcRequiredClaim>,
    /// JWT claim used as the user name
    #[serde(default)]
    pub username_claim: String,
    /// Prefix prepended to user name claims
    #[serde(default)]
    pub username_prefix: String,
}

/// A claim/value pair required in the ID token
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct OidcRequiredClaim {
    /// Claim name
    pub claim: String,
    /// Required value
    pub value: String,
}

/// Desired state of an AWSIamConfig
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "anywhere.eks.amazonaws.com",
    version = "v1alpha1",
    kind = "AWSIamConfig",
    plural = "awsiamconfigs",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AwsIamConfigSpec {
    /// AWS region of the authenticator
    #[serde(default)]
    pub aws_region: String,
    /// Backend modes, in priority order
    #[serde(default)]
    pub backend_mode: Vec<String>,
    /// AWS partition
    #[serde(default = "default_partition")]
    pub partition: String,
}

fn default_partition() -> String {
    "aws".to_string()
}
