//! Common types for the MicroVM provider: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod bundle;
pub mod clock;
pub mod crd;
pub mod env;
pub mod error;
pub mod retry;
pub mod spec;
pub mod telemetry;
pub mod template;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group shared by every EKS Anywhere style configuration object
pub const API_GROUP: &str = "anywhere.eks.amazonaws.com";

/// API version of the configuration objects
pub const API_VERSION: &str = "v1alpha1";

/// Namespace used for exported objects whose source namespace is empty
pub const DEFAULT_NAMESPACE: &str = "default";

/// Namespace holding the provider's system resources on the target cluster
pub const EKSA_SYSTEM_NAMESPACE: &str = "eksa-system";

/// Separator between documents in a multi-document YAML file
pub const YAML_SEPARATOR: &str = "\n---\n";
