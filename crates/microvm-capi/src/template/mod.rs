//! Cluster API manifest generation for MicroVM clusters
//!
//! The builder projects a [`ClusterSpec`] into a flat [`TemplateValues`] map
//! and renders it against the embedded control-plane and worker templates.
//! Callers inject per-call values (template names, host endpoint, SSH
//! access) through [`BuildMapOption`]s, applied after the base map in order.

use std::sync::Arc;

use tracing::debug;

use crate::constants::DEFAULT_KUBE_VIP_IMAGE;
use crate::extra_args::{
    aws_iam_auth_extra_args, oidc_to_extra_args, pod_iam_auth_extra_args,
    secure_cipher_suites_string, secure_etcd_tls_cipher_suites_extra_args,
    secure_tls_cipher_suites_extra_args,
};
use microvm_common::clock::Clock;
use microvm_common::spec::ClusterSpec;
use microvm_common::template::{TemplateValues, Templater};
use microvm_common::{Error, Result, EKSA_SYSTEM_NAMESPACE};

const CONTROL_PLANE_TEMPLATE: &str = include_str!("config/template-cp.yaml");
const WORKERS_TEMPLATE: &str = include_str!("config/template-md.yaml");
const AUDIT_POLICY: &str = include_str!("config/audit-policy.yaml");

/// Override applied to a template value map after it is built
pub type BuildMapOption = Box<dyn Fn(&mut TemplateValues) + Send + Sync>;

/// Kubernetes API server audit policy written to every control plane node
pub fn audit_policy() -> &'static str {
    AUDIT_POLICY.trim_end()
}

/// Renders control-plane and worker manifests for a cluster
pub struct MicrovmTemplateBuilder {
    clock: Arc<dyn Clock>,
    templater: Templater,
}

impl MicrovmTemplateBuilder {
    /// Create a builder that stamps template names from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            templater: Templater::new(),
        }
    }

    /// Name of the control plane machine template
    pub fn cp_machine_template_name(&self, cluster_name: &str) -> String {
        format!(
            "{cluster_name}-control-plane-template-{}",
            self.clock.now_millis()
        )
    }

    /// Name of the worker machine template
    pub fn worker_machine_template_name(&self, cluster_name: &str) -> String {
        format!(
            "{cluster_name}-worker-node-template-{}",
            self.clock.now_millis()
        )
    }

    /// Name of the etcd machine template
    pub fn etcd_machine_template_name(&self, cluster_name: &str) -> String {
        format!("{cluster_name}-etcd-template-{}", self.clock.now_millis())
    }

    /// Render the control plane manifest
    pub fn generate_capi_spec_control_plane(
        &self,
        spec: &ClusterSpec,
        options: &[BuildMapOption],
    ) -> Result<Vec<u8>> {
        let mut values = build_template_map_cp(spec)?;
        apply_options(&mut values, options);
        debug!(cluster = %spec.name(), keys = values.len(), "rendering control plane manifest");
        Ok(self.templater.execute(CONTROL_PLANE_TEMPLATE, &values)?)
    }

    /// Render the worker manifest
    pub fn generate_capi_spec_workers(
        &self,
        spec: &ClusterSpec,
        options: &[BuildMapOption],
    ) -> Result<Vec<u8>> {
        let mut values = build_template_map_md(spec)?;
        apply_options(&mut values, options);
        debug!(cluster = %spec.name(), keys = values.len(), "rendering worker manifest");
        Ok(self.templater.execute(WORKERS_TEMPLATE, &values)?)
    }
}

fn apply_options(values: &mut TemplateValues, options: &[BuildMapOption]) {
    for option in options {
        option(values);
    }
}

fn insert(values: &mut TemplateValues, key: &str, value: impl Into<serde_json::Value>) {
    values.insert(key.to_string(), value.into());
}

/// Template values for the control plane manifest
///
/// `externalEtcd`/`externalEtcdReplicas`, `awsIamAuth`, and
/// `controlPlaneTaints` are only present when the cluster configures them.
pub fn build_template_map_cp(spec: &ClusterSpec) -> Result<TemplateValues> {
    let bundle = &spec.versions_bundle;
    let cluster = &spec.cluster.spec;
    let control_plane = &cluster.control_plane_configuration;

    let etcd_extra_args = secure_etcd_tls_cipher_suites_extra_args();
    let shared_extra_args = secure_tls_cipher_suites_extra_args();
    let api_server_extra_args = oidc_to_extra_args(spec.oidc_config.as_ref())
        .append(aws_iam_auth_extra_args(spec.aws_iam_config.as_ref()))
        .append(pod_iam_auth_extra_args(cluster.pod_iam_config.as_ref()))
        .append(shared_extra_args.clone());

    let mut values = TemplateValues::new();
    insert(&mut values, "clusterName", spec.name());
    insert(&mut values, "controlPlaneEndpointIp", control_plane.endpoint.host.as_str());
    insert(&mut values, "controlPlaneReplicas", control_plane.count);
    insert(&mut values, "kubernetesRepository", bundle.kube_distro.kubernetes.repository.as_str());
    insert(&mut values, "kubernetesVersion", bundle.kube_distro.kubernetes.tag.as_str());
    insert(&mut values, "etcdRepository", bundle.kube_distro.etcd.repository.as_str());
    insert(&mut values, "etcdVersion", bundle.kube_distro.etcd.tag.as_str());
    insert(&mut values, "corednsRepository", bundle.kube_distro.core_dns.repository.as_str());
    insert(&mut values, "corednsVersion", bundle.kube_distro.core_dns.tag.as_str());
    insert(&mut values, "kindNodeImage", bundle.eks_d.kind_node.versioned_image());
    insert(&mut values, "etcdExtraArgs", etcd_extra_args.to_partial_yaml());
    insert(&mut values, "etcdCipherSuites", secure_cipher_suites_string());
    insert(&mut values, "apiserverExtraArgs", api_server_extra_args.to_partial_yaml());
    insert(&mut values, "controllermanagerExtraArgs", shared_extra_args.to_partial_yaml());
    insert(&mut values, "schedulerExtraArgs", shared_extra_args.to_partial_yaml());
    insert(&mut values, "kubeletExtraArgs", shared_extra_args.to_partial_yaml());
    insert(&mut values, "externalEtcdVersion", bundle.kube_distro.etcd_version.as_str());
    insert(&mut values, "eksaSystemNamespace", EKSA_SYSTEM_NAMESPACE);
    insert(&mut values, "auditPolicy", audit_policy());
    insert(&mut values, "podCidrs", cluster.cluster_network.pods.cidr_blocks.clone());
    insert(&mut values, "serviceCidrs", cluster.cluster_network.services.cidr_blocks.clone());
    insert(&mut values, "kubeVipImage", DEFAULT_KUBE_VIP_IMAGE);

    if let Some(etcd) = &cluster.external_etcd_configuration {
        insert(&mut values, "externalEtcd", true);
        insert(&mut values, "externalEtcdReplicas", etcd.count);
    }
    if spec.aws_iam_config.is_some() {
        insert(&mut values, "awsIamAuth", true);
    }
    if !control_plane.taints.is_empty() {
        let taints = serde_json::to_value(&control_plane.taints).map_err(|e| {
            Error::serialization(format!("unable to encode control plane taints: {e}"))
        })?;
        insert(&mut values, "controlPlaneTaints", taints);
    }

    Ok(values)
}

/// Template values for the worker manifest
///
/// Built from the first worker node group only.
pub fn build_template_map_md(spec: &ClusterSpec) -> Result<TemplateValues> {
    let bundle = &spec.versions_bundle;
    let group = spec.cluster.first_worker_group().ok_or_else(|| {
        Error::validation_for_field(
            spec.name(),
            "spec.workerNodeGroupConfigurations",
            "at least one worker node group is required",
        )
    })?;

    let mut values = TemplateValues::new();
    insert(&mut values, "clusterName", spec.name());
    insert(&mut values, "worker_replicas", group.count);
    insert(&mut values, "kubernetesVersion", bundle.kube_distro.kubernetes.tag.as_str());
    insert(&mut values, "kindNodeImage", bundle.eks_d.kind_node.versioned_image());
    insert(&mut values, "eksaSystemNamespace", EKSA_SYSTEM_NAMESPACE);
    insert(
        &mut values,
        "kubeletExtraArgs",
        secure_tls_cipher_suites_extra_args().to_partial_yaml(),
    );
    Ok(values)
}
