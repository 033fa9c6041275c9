//! Centralized constants for the microvm-capi crate

// =============================================================================
// Provider Identity
// =============================================================================

/// Name the provider registers under
pub const MICROVM_PROVIDER_NAME: &str = "microvm";

/// Resource type of the datacenter config
pub const DATACENTER_RESOURCE_TYPE: &str = "microvmdatacenterconfigs.anywhere.eks.amazonaws.com";

/// Resource type of the machine config
///
/// Empty: machine configs are not reconciled as a separate resource type.
pub const MACHINE_RESOURCE_TYPE: &str = "";

// =============================================================================
// Environment
// =============================================================================

/// Flintlock edition: provisioning endpoint key
pub const HOST_ENDPOINT_KEY: &str = "HOST_ENDPOINT";

/// Bare-metal edition: provisioning endpoint key
pub const HARDWARE_HOST_ENDPOINT_KEY: &str = "HARDWARE_HOST_ENDPOINT";

/// Proxy settings passed to the bootstrap cluster
pub const HTTP_PROXY_KEY: &str = "HTTP_PROXY";
/// Proxy settings passed to the bootstrap cluster
pub const HTTPS_PROXY_KEY: &str = "HTTPS_PROXY";
/// Proxy settings passed to the bootstrap cluster
pub const NO_PROXY_KEY: &str = "NO_PROXY";

// =============================================================================
// Controller Deployment
// =============================================================================

/// Namespace of the infrastructure controller
pub const CAPMVM_NAMESPACE: &str = "capmvm-system";

/// Deployment of the infrastructure controller
pub const CAPMVM_CONTROLLER_DEPLOYMENT: &str = "capmvm-controller-manager";

/// Folder holding the infrastructure manifests of a release
pub const INFRASTRUCTURE_FOLDER_PREFIX: &str = "infrastructure-microvm";

// =============================================================================
// Default Values
// =============================================================================

/// kube-vip image used for the control plane VIP
pub const DEFAULT_KUBE_VIP_IMAGE: &str = "ghcr.io/kube-vip/kube-vip:latest";

/// Time allowed for a deployment to become available
pub const DEFAULT_DEPLOYMENT_TIMEOUT: &str = "5m";

/// Condition waited on for deployments
pub const DEPLOYMENT_AVAILABLE_CONDITION: &str = "Available";
