//! Provider state stored as annotations on configuration objects
//!
//! Annotations are the wire representation; [`ProviderFlags`] is the typed
//! view callers should reason about. A missing annotation map reads as "no
//! flags set" and mutators create the map on first write.

use std::collections::BTreeMap;

use kube::ResourceExt;

/// Suspends reconciliation of the annotated object
pub const PAUSED_ANNOTATION: &str = "anywhere.eks.amazonaws.com/paused";

/// Marks a machine config as the control-plane machine class
pub const CONTROL_PLANE_ANNOTATION: &str = "anywhere.eks.amazonaws.com/control-plane";

/// Marks a machine config as used for external etcd
pub const ETCD_ANNOTATION: &str = "anywhere.eks.amazonaws.com/etcd";

/// Name of the management cluster owning the annotated object
pub const MANAGEMENT_ANNOTATION: &str = "anywhere.eks.amazonaws.com/managed-by";

const TRUE: &str = "true";

/// Typed view of the provider flags carried in annotations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderFlags {
    /// Reconciliation is suspended
    pub paused: bool,
    /// Object is the control-plane machine class
    pub control_plane: bool,
    /// Object is used for external etcd
    pub etcd: bool,
    /// Managing cluster; `None` when unset, `Some("")` when set to empty
    pub managed_by: Option<String>,
}

impl ProviderFlags {
    /// Read the flags out of an annotation map
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        Self {
            paused: is_true(annotations, PAUSED_ANNOTATION),
            control_plane: is_true(annotations, CONTROL_PLANE_ANNOTATION),
            etcd: is_true(annotations, ETCD_ANNOTATION),
            managed_by: annotations.get(MANAGEMENT_ANNOTATION).cloned(),
        }
    }

    /// Write the flags into an annotation map
    ///
    /// Cleared flags remove their annotation; unrelated annotations are kept.
    pub fn apply_to(&self, annotations: &mut BTreeMap<String, String>) {
        set_bool(annotations, PAUSED_ANNOTATION, self.paused);
        set_bool(annotations, CONTROL_PLANE_ANNOTATION, self.control_plane);
        set_bool(annotations, ETCD_ANNOTATION, self.etcd);
        match &self.managed_by {
            Some(cluster) => {
                annotations.insert(MANAGEMENT_ANNOTATION.to_string(), cluster.clone());
            }
            None => {
                annotations.remove(MANAGEMENT_ANNOTATION);
            }
        }
    }

    /// True when owned by a management cluster (non-empty `managed_by`)
    pub fn is_management(&self) -> bool {
        self.managed_by.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// True when `key` is present and set to `"true"`
pub(crate) fn is_true(annotations: &BTreeMap<String, String>, key: &str) -> bool {
    annotations.get(key).is_some_and(|v| v == TRUE)
}

fn set_bool(annotations: &mut BTreeMap<String, String>, key: &str, value: bool) {
    if value {
        annotations.insert(key.to_string(), TRUE.to_string());
    } else {
        annotations.remove(key);
    }
}

/// Flag-store operations shared by every provider configuration object
pub trait ProviderAnnotations: ResourceExt {
    /// Suspend reconciliation
    fn pause_reconcile(&mut self) {
        self.annotations_mut()
            .insert(PAUSED_ANNOTATION.to_string(), TRUE.to_string());
    }

    /// True when reconciliation is suspended
    fn is_reconcile_paused(&self) -> bool {
        is_true(self.annotations(), PAUSED_ANNOTATION)
    }

    /// Resume reconciliation
    fn clear_pause_annotation(&mut self) {
        if let Some(annotations) = self.meta_mut().annotations.as_mut() {
            annotations.remove(PAUSED_ANNOTATION);
        }
    }

    /// Typed view of the provider flags
    fn flags(&self) -> ProviderFlags {
        ProviderFlags::from_annotations(self.annotations())
    }

    /// Replace the provider flags with `flags`
    fn apply_flags(&mut self, flags: &ProviderFlags) {
        flags.apply_to(self.annotations_mut());
    }
}
