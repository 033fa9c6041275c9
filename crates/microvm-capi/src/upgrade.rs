//! Upgrade decisions
//!
//! Pure predicates over the current and desired cluster specs. A machine
//! template must be regenerated whenever the Kubernetes version or the
//! bundle release changes; the three predicates are kept separate so each
//! template kind can diverge later.

use microvm_common::spec::ClusterSpec;

use crate::constants::MICROVM_PROVIDER_NAME;

/// Version change of a provider component
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentChangeDiff {
    /// Component name
    pub component_name: String,
    /// Version currently installed
    pub old_version: String,
    /// Version to install
    pub new_version: String,
}

fn versions_changed(old: &ClusterSpec, new: &ClusterSpec) -> bool {
    old.kubernetes_version() != new.kubernetes_version()
        || old.bundle_number() != new.bundle_number()
}

/// True when the control plane machine template must be regenerated
pub fn needs_new_control_plane_template(old: &ClusterSpec, new: &ClusterSpec) -> bool {
    versions_changed(old, new)
}

/// True when the worker machine template must be regenerated
pub fn needs_new_workload_template(old: &ClusterSpec, new: &ClusterSpec) -> bool {
    versions_changed(old, new)
}

/// True when the etcd machine template must be regenerated
pub fn needs_new_etcd_template(old: &ClusterSpec, new: &ClusterSpec) -> bool {
    versions_changed(old, new)
}

/// Provider version change between two specs, `None` when unchanged
pub fn change_diff(current: &ClusterSpec, new: &ClusterSpec) -> Option<ComponentChangeDiff> {
    if current.microvm_version() == new.microvm_version() {
        return None;
    }
    Some(ComponentChangeDiff {
        component_name: MICROVM_PROVIDER_NAME.to_string(),
        old_version: current.microvm_version().to_string(),
        new_version: new.microvm_version().to_string(),
    })
}
