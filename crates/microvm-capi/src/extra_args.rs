//! Extra command-line arguments for control plane components
//!
//! Each builder returns an [`ExtraArgs`] layer; layers are combined with
//! [`ExtraArgs::append`], where the appended layer wins on key collision.

use std::collections::BTreeMap;

use microvm_common::crd::{AWSIamConfig, OIDCConfig, PodIamConfig};

/// TLS cipher suites allowed on every control plane endpoint
pub const SECURE_CIPHER_SUITES: &[&str] = &[
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
];

const AWS_IAM_AUTHENTICATOR_KUBECONFIG: &str =
    "/etc/kubernetes/aws-iam-authenticator/kubeconfig.yaml";

/// Comma-separated [`SECURE_CIPHER_SUITES`]
pub fn secure_cipher_suites_string() -> String {
    SECURE_CIPHER_SUITES.join(",")
}

/// Flag name to value map for one component
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtraArgs(BTreeMap<String, String>);

impl ExtraArgs {
    /// Empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set `key` to `value` unless `value` is empty
    fn insert_non_empty(&mut self, key: &str, value: &str) {
        if !value.is_empty() {
            self.insert(key, value);
        }
    }

    /// Merge `other` into `self`; values from `other` win
    pub fn append(mut self, other: ExtraArgs) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no argument is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Template value rendered through the `to_yaml` filter
    pub fn to_partial_yaml(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtraArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// etcd peer and client cipher suites
pub fn secure_etcd_tls_cipher_suites_extra_args() -> ExtraArgs {
    [("cipher-suites", secure_cipher_suites_string())]
        .into_iter()
        .collect()
}

/// Cipher suites shared by the API server, controller manager, scheduler, and kubelet
pub fn secure_tls_cipher_suites_extra_args() -> ExtraArgs {
    [("tls-cipher-suites", secure_cipher_suites_string())]
        .into_iter()
        .collect()
}

/// API server OIDC flags
///
/// Only the first required claim is forwarded.
pub fn oidc_to_extra_args(config: Option<&OIDCConfig>) -> ExtraArgs {
    let mut args = ExtraArgs::new();
    let Some(config) = config else {
        return args;
    };
    let spec = &config.spec;

    args.insert_non_empty("oidc-client-id", &spec.client_id);
    args.insert_non_empty("oidc-groups-claim", &spec.groups_claim);
    args.insert_non_empty("oidc-groups-prefix", &spec.groups_prefix);
    args.insert_non_empty("oidc-issuer-url", &spec.issuer_url);
    if let Some(claim) = spec.required_claims.first() {
        args.insert("oidc-required-claim", format!("{}={}", claim.claim, claim.value));
    }
    args.insert_non_empty("oidc-username-claim", &spec.username_claim);
    args.insert_non_empty("oidc-username-prefix", &spec.username_prefix);
    args
}

/// API server AWS IAM authenticator webhook flags
pub fn aws_iam_auth_extra_args(config: Option<&AWSIamConfig>) -> ExtraArgs {
    let mut args = ExtraArgs::new();
    if config.is_some() {
        args.insert(
            "authentication-token-webhook-config-file",
            AWS_IAM_AUTHENTICATOR_KUBECONFIG,
        );
    }
    args
}

/// API server pod IAM flags
pub fn pod_iam_auth_extra_args(config: Option<&PodIamConfig>) -> ExtraArgs {
    let mut args = ExtraArgs::new();
    if let Some(config) = config {
        args.insert("service-account-issuer", config.service_account_issuer.clone());
    }
    args
}
