//! MicroVM (CAPMVM) Cluster API provider crate
//!
//! This crate provides:
//! - Provider trait and the MicroVM provider controller
//! - Template builder rendering the control plane and worker manifests
//! - Upgrade decisions over current and desired cluster specs
//! - Extra-args builders for kube-apiserver, kubelet, and etcd flags

pub mod client;
pub mod constants;
pub mod extra_args;
pub mod provider;
pub mod template;
pub mod upgrade;

// Re-export client types
pub use client::{KubeCluster, ProviderKubectlClient};

#[cfg(test)]
pub use client::MockProviderKubectlClient;

// Re-export provider types
pub use provider::{
    create_provider, validate_single_control_plane, BootstrapClusterOption, CapiSpec,
    InfrastructureBundle, MicrovmProvider, Provider, ProviderCapabilities, ProviderConfigs,
    ProviderEdition,
};

pub use template::{build_template_map_cp, build_template_map_md, BuildMapOption, MicrovmTemplateBuilder};
pub use upgrade::{
    change_diff, needs_new_control_plane_template, needs_new_etcd_template,
    needs_new_workload_template, ComponentChangeDiff,
};
