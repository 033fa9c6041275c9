//! MicroVM infrastructure provider (CAPMVM)
//!
//! Provisions clusters as microVMs scheduled through a flintlock (or
//! bare-metal hardware) endpoint. The provider validates the user's machine
//! configs, publishes the endpoint for the host framework, and renders the
//! control-plane and worker manifests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    validate_single_control_plane, BootstrapClusterOption, CapiSpec, InfrastructureBundle,
    Provider, ProviderCapabilities, ProviderConfigs, ProviderEdition,
};
use crate::client::{KubeCluster, ProviderKubectlClient};
use crate::constants::{
    CAPMVM_CONTROLLER_DEPLOYMENT, CAPMVM_NAMESPACE, DATACENTER_RESOURCE_TYPE,
    DEFAULT_DEPLOYMENT_TIMEOUT, DEPLOYMENT_AVAILABLE_CONDITION, HTTPS_PROXY_KEY, HTTP_PROXY_KEY,
    INFRASTRUCTURE_FOLDER_PREFIX, MACHINE_RESOURCE_TYPE, MICROVM_PROVIDER_NAME, NO_PROXY_KEY,
};
use crate::template::{BuildMapOption, MicrovmTemplateBuilder};
use crate::upgrade::{self, ComponentChangeDiff};
use microvm_common::clock::Clock;
use microvm_common::crd::{Cluster, MicrovmDatacenterConfig, MicrovmMachineConfig};
use microvm_common::env::EnvStore;
use microvm_common::retry::{retry_fixed, RetryConfig};
use microvm_common::spec::ClusterSpec;
use microvm_common::template::TemplateValues;
use microvm_common::{Error, Result};

const CONTROL_PLANE_REF_FIELD: &str = "spec.controlPlaneConfiguration.machineGroupRef";
const WORKER_REF_FIELD: &str = "spec.workerNodeGroupConfigurations[0].machineGroupRef";

/// Login captured from a machine config during create validation
#[derive(Clone, Debug, PartialEq, Eq)]
struct SshAccess {
    username: String,
    authorized_key: String,
}

impl SshAccess {
    fn from_machine(cluster_name: &str, machine: &MicrovmMachineConfig) -> Result<Self> {
        let authorized_key = machine.validate_ssh_access(cluster_name)?.to_string();
        let username = machine
            .spec
            .users
            .first()
            .map(|u| u.name.clone())
            .unwrap_or_default();
        Ok(Self {
            username,
            authorized_key,
        })
    }

    fn insert_into(&self, values: &mut TemplateValues, username_key: &str, key_key: &str) {
        values.insert(username_key.to_string(), Value::from(self.username.as_str()));
        values.insert(key_key.to_string(), Value::from(self.authorized_key.as_str()));
    }
}

/// MicroVM infrastructure provider
pub struct MicrovmProvider {
    edition: ProviderEdition,
    capabilities: ProviderCapabilities,
    cluster_config: Cluster,
    datacenter_config: MicrovmDatacenterConfig,
    machine_configs: BTreeMap<String, MicrovmMachineConfig>,
    control_plane_ssh: Option<SshAccess>,
    worker_ssh: Option<SshAccess>,
    client: Arc<dyn ProviderKubectlClient>,
    template_builder: MicrovmTemplateBuilder,
    env: Arc<dyn EnvStore>,
    retry: RetryConfig,
}

impl MicrovmProvider {
    /// Create a provider for the given edition
    pub fn new(
        edition: ProviderEdition,
        configs: ProviderConfigs,
        client: Arc<dyn ProviderKubectlClient>,
        clock: Arc<dyn Clock>,
        env: Arc<dyn EnvStore>,
    ) -> Self {
        Self {
            edition,
            capabilities: edition.capabilities(),
            cluster_config: configs.cluster,
            datacenter_config: configs.datacenter,
            machine_configs: configs.machines,
            control_plane_ssh: None,
            worker_ssh: None,
            client,
            template_builder: MicrovmTemplateBuilder::new(clock),
            env,
            retry: RetryConfig::default(),
        }
    }

    /// Override the capability set of the edition
    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Override the readiness retry schedule
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Edition this provider was built for
    pub fn edition(&self) -> ProviderEdition {
        self.edition
    }

    /// Template builder used for manifest generation
    pub fn template_builder(&self) -> &MicrovmTemplateBuilder {
        &self.template_builder
    }

    fn cluster_name(&self) -> String {
        self.cluster_config.name_any()
    }

    fn resolve_machine(&self, name: Option<&str>, field: &str) -> Result<&MicrovmMachineConfig> {
        let cluster_name = self.cluster_name();
        let name = name.ok_or_else(|| {
            Error::validation_for_field(&cluster_name, field, "machine group reference is required")
        })?;
        self.machine_configs.get(name).ok_or_else(|| {
            Error::validation_for_field(
                &cluster_name,
                field,
                format!("machine config {name} not found"),
            )
        })
    }

    fn machine_ref_names(&self) -> Result<(String, String)> {
        let cp = self
            .resolve_machine(self.cluster_config.control_plane_machine_ref(), CONTROL_PLANE_REF_FIELD)?
            .name_any();
        let worker = self
            .resolve_machine(self.cluster_config.worker_machine_ref(), WORKER_REF_FIELD)?
            .name_any();
        Ok((cp, worker))
    }

    fn set_env_vars(&self) -> Result<()> {
        let key = self.capabilities.endpoint_env_key;
        self.env
            .set(key, &self.datacenter_config.spec.flintlock_url)
            .map_err(|e| {
                Error::provider_for(
                    self.cluster_name(),
                    format!("failed setup and validations: {e}"),
                )
            })?;
        debug!(cluster = %self.cluster_name(), key = %key, "published provisioning endpoint");
        Ok(())
    }

    /// Wait for a deployment to become available, retrying on failure
    pub async fn wait_for_deployment_ready(
        &self,
        cluster: &KubeCluster,
        target: &str,
        namespace: &str,
    ) -> Result<()> {
        retry_fixed(&self.retry, "wait_for_deployment", || {
            self.client.wait_for_deployment(
                cluster,
                DEFAULT_DEPLOYMENT_TIMEOUT,
                DEPLOYMENT_AVAILABLE_CONDITION,
                target,
                namespace,
            )
        })
        .await
    }
}

#[async_trait]
impl Provider for MicrovmProvider {
    fn name(&self) -> &'static str {
        MICROVM_PROVIDER_NAME
    }

    fn datacenter_resource_type(&self) -> &'static str {
        DATACENTER_RESOURCE_TYPE
    }

    fn machine_resource_type(&self) -> &'static str {
        MACHINE_RESOURCE_TYPE
    }

    fn bootstrap_cluster_opts(&self) -> Result<Vec<BootstrapClusterOption>> {
        let mut env = BTreeMap::new();
        if let Some(proxy) = &self.cluster_config.spec.proxy_configuration {
            let mut no_proxy = vec![
                self.cluster_config
                    .spec
                    .control_plane_configuration
                    .endpoint
                    .host
                    .clone(),
                self.datacenter_config.spec.flintlock_url.clone(),
            ];
            no_proxy.extend(proxy.no_proxy.iter().filter(|s| !s.is_empty()).cloned());

            env.insert(HTTP_PROXY_KEY.to_string(), proxy.http_proxy.clone());
            env.insert(HTTPS_PROXY_KEY.to_string(), proxy.https_proxy.clone());
            env.insert(NO_PROXY_KEY.to_string(), no_proxy.join(","));
        }
        Ok(vec![BootstrapClusterOption::Env(env)])
    }

    async fn bootstrap_setup(&self, _cluster_config: &Cluster, _cluster: &KubeCluster) -> Result<()> {
        Ok(())
    }

    async fn setup_and_validate_create_cluster(&mut self, _spec: &ClusterSpec) -> Result<()> {
        let cluster_name = self.cluster_name();
        warn!(
            cluster = %cluster_name,
            "The microvm infrastructure provider is still in development and should only be used for testing/dev purposes"
        );

        let control_plane = self.resolve_machine(
            self.cluster_config.control_plane_machine_ref(),
            CONTROL_PLANE_REF_FIELD,
        )?;
        let control_plane_ssh = SshAccess::from_machine(&cluster_name, control_plane)?;
        let worker = self.resolve_machine(self.cluster_config.worker_machine_ref(), WORKER_REF_FIELD)?;
        let worker_ssh = SshAccess::from_machine(&cluster_name, worker)?;

        self.datacenter_config.validate()?;
        if self.capabilities.enforce_single_control_plane {
            validate_single_control_plane(&cluster_name, self.machine_configs.values())?;
        }

        self.set_env_vars()?;
        self.control_plane_ssh = Some(control_plane_ssh);
        self.worker_ssh = Some(worker_ssh);

        info!(cluster = %cluster_name, edition = %self.edition, "create cluster setup validated");
        Ok(())
    }

    async fn setup_and_validate_delete_cluster(&self) -> Result<()> {
        self.set_env_vars()
    }

    async fn setup_and_validate_upgrade_cluster(
        &self,
        _cluster: &KubeCluster,
        _spec: &ClusterSpec,
    ) -> Result<()> {
        Ok(())
    }

    async fn update_secrets(&self, _cluster: &KubeCluster) -> Result<()> {
        Ok(())
    }

    async fn generate_capi_spec_for_create(
        &self,
        _cluster: &KubeCluster,
        spec: &ClusterSpec,
    ) -> Result<CapiSpec> {
        let cluster_name = spec.name();
        let host_endpoint = self.datacenter_config.spec.flintlock_url.clone();
        let wrap = |e: Error| {
            Error::provider_for(
                &cluster_name,
                format!("error generating cluster api spec contents: {e}"),
            )
        };

        let cp_template = self.template_builder.cp_machine_template_name(&cluster_name);
        let etcd_template = self.template_builder.etcd_machine_template_name(&cluster_name);
        let cp_ssh = self.control_plane_ssh.clone();
        let cp_endpoint = host_endpoint.clone();
        let cp_options: Vec<BuildMapOption> = vec![Box::new(move |values: &mut TemplateValues| {
            values.insert("controlPlaneTemplateName".to_string(), Value::from(cp_template.as_str()));
            values.insert("etcdTemplateName".to_string(), Value::from(etcd_template.as_str()));
            values.insert("hostEndpoint".to_string(), Value::from(cp_endpoint.as_str()));
            if let Some(ssh) = &cp_ssh {
                ssh.insert_into(values, "controlPlaneSshUsername", "controlPlaneSshAuthorizedKey");
            }
        })];
        let control_plane = self
            .template_builder
            .generate_capi_spec_control_plane(spec, &cp_options)
            .map_err(wrap)?;

        let worker_template = self.template_builder.worker_machine_template_name(&cluster_name);
        let worker_ssh = self.worker_ssh.clone();
        let worker_options: Vec<BuildMapOption> = vec![Box::new(move |values: &mut TemplateValues| {
            values.insert("workloadTemplateName".to_string(), Value::from(worker_template.as_str()));
            values.insert("hostEndpoint".to_string(), Value::from(host_endpoint.as_str()));
            if let Some(ssh) = &worker_ssh {
                ssh.insert_into(values, "workerSshUsername", "workerSshAuthorizedKey");
            }
        })];
        let workers = self
            .template_builder
            .generate_capi_spec_workers(spec, &worker_options)
            .map_err(wrap)?;

        info!(
            cluster = %cluster_name,
            control_plane_bytes = control_plane.len(),
            workers_bytes = workers.len(),
            "generated cluster api spec"
        );
        Ok(CapiSpec {
            control_plane,
            workers,
        })
    }

    async fn generate_capi_spec_for_upgrade(
        &self,
        _bootstrap_cluster: &KubeCluster,
        _workload_cluster: &KubeCluster,
        _current_spec: &ClusterSpec,
        _new_spec: &ClusterSpec,
    ) -> Result<CapiSpec> {
        Ok(CapiSpec::default())
    }

    fn generate_storage_class(&self) -> Option<Vec<u8>> {
        None
    }

    fn generate_mhc(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn update_kube_config(&self, _content: &mut Vec<u8>, _cluster_name: &str) -> Result<()> {
        Ok(())
    }

    fn version(&self, spec: &ClusterSpec) -> String {
        spec.microvm_version().to_string()
    }

    fn env_map(&self) -> Result<BTreeMap<String, String>> {
        let mut env = BTreeMap::new();
        for key in self.edition.required_env_keys() {
            match self.env.get(key) {
                Some(value) if !value.is_empty() => {
                    env.insert(key.to_string(), value);
                }
                _ => {
                    return Err(Error::validation_for(
                        self.cluster_name(),
                        format!("required env not set {key}"),
                    ));
                }
            }
        }
        Ok(env)
    }

    fn deployments(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([(
            CAPMVM_NAMESPACE.to_string(),
            vec![CAPMVM_CONTROLLER_DEPLOYMENT.to_string()],
        )])
    }

    fn infrastructure_bundle(&self, spec: &ClusterSpec) -> InfrastructureBundle {
        let bundle = &spec.versions_bundle.microvm;
        InfrastructureBundle {
            folder_name: format!("{INFRASTRUCTURE_FOLDER_PREFIX}/{}/", bundle.version),
            manifests: self.edition.manifests(bundle),
        }
    }

    fn datacenter_config(&self) -> &MicrovmDatacenterConfig {
        &self.datacenter_config
    }

    fn machine_configs(&mut self) -> Result<Vec<MicrovmMachineConfig>> {
        let (cp_name, worker_name) = self.machine_ref_names()?;
        let managed_by = if self.cluster_config.is_managed() {
            self.cluster_config.management_cluster_name().map(str::to_string)
        } else {
            None
        };

        let mut configs = Vec::with_capacity(2);
        if let Some(cp) = self.machine_configs.get_mut(&cp_name) {
            cp.set_control_plane();
            if let Some(mgmt) = &managed_by {
                cp.set_management(mgmt);
            }
            configs.push(cp.clone());
        }
        if worker_name != cp_name {
            if let Some(worker) = self.machine_configs.get_mut(&worker_name) {
                if let Some(mgmt) = &managed_by {
                    worker.set_management(mgmt);
                }
                configs.push(worker.clone());
            }
        }
        Ok(configs)
    }

    async fn validate_new_spec(&self, _cluster: &KubeCluster, _spec: &ClusterSpec) -> Result<()> {
        Ok(())
    }

    fn change_diff(&self, current: &ClusterSpec, new: &ClusterSpec) -> Option<ComponentChangeDiff> {
        upgrade::change_diff(current, new)
    }

    async fn run_post_control_plane_upgrade(
        &self,
        _old_spec: &ClusterSpec,
        _new_spec: &ClusterSpec,
        _workload_cluster: &KubeCluster,
        _management_cluster: &KubeCluster,
    ) -> Result<()> {
        Ok(())
    }

    async fn upgrade_needed(&self, _old_spec: &ClusterSpec, _new_spec: &ClusterSpec) -> Result<bool> {
        Ok(false)
    }

    async fn run_post_control_plane_creation(
        &self,
        _spec: &ClusterSpec,
        _cluster: &KubeCluster,
    ) -> Result<()> {
        Ok(())
    }

    async fn delete_resources(&self, _spec: &ClusterSpec) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::client::MockProviderKubectlClient;
    use microvm_common::bundle::{
        BundleRelease, EksDRelease, Image, KubeDistro, Manifest, MicrovmBundle, VersionedRepository,
        VersionsBundle,
    };
    use microvm_common::clock::FixedClock;
    use microvm_common::crd::{
        CidrBlocks, ClusterConfigSpec, ClusterNetwork, ControlPlaneConfiguration, Endpoint,
        ManagementCluster, MicrovmDatacenterConfigSpec, MicrovmMachineConfigSpec, OsFamily,
        ProxyConfiguration, Ref, UserConfiguration, WorkerNodeGroupConfiguration,
        CONTROL_PLANE_ANNOTATION, MANAGEMENT_ANNOTATION,
    };
    use microvm_common::env::MemoryEnv;

    const NOW_MILLIS: i64 = 1_700_000_000_000;

    fn machine_ref(name: &str) -> Option<Ref> {
        Some(Ref {
            kind: "MicrovmMachineConfig".to_string(),
            name: name.to_string(),
        })
    }

    fn cluster(cp: &str, worker: &str) -> Cluster {
        Cluster::new(
            "test1",
            ClusterConfigSpec {
                kubernetes_version: "1.27".to_string(),
                control_plane_configuration: ControlPlaneConfiguration {
                    count: 1,
                    endpoint: Endpoint {
                        host: "10.10.0.2".to_string(),
                    },
                    machine_group_ref: machine_ref(cp),
                    taints: vec![],
                },
                worker_node_group_configurations: vec![WorkerNodeGroupConfiguration {
                    name: "md-0".to_string(),
                    count: 2,
                    machine_group_ref: machine_ref(worker),
                }],
                cluster_network: ClusterNetwork {
                    pods: CidrBlocks {
                        cidr_blocks: vec!["192.168.0.0/16".to_string()],
                    },
                    services: CidrBlocks {
                        cidr_blocks: vec!["10.96.0.0/12".to_string()],
                    },
                },
                ..Default::default()
            },
        )
    }

    fn machine(name: &str, keys: &[&str]) -> MicrovmMachineConfig {
        let users = if keys.is_empty() {
            vec![]
        } else {
            vec![UserConfiguration {
                name: "ubuntu".to_string(),
                ssh_authorized_keys: keys.iter().map(|k| k.to_string()).collect(),
            }]
        };
        MicrovmMachineConfig::new(
            name,
            MicrovmMachineConfigSpec {
                os_family: OsFamily::Ubuntu,
                users,
            },
        )
    }

    fn datacenter(url: &str) -> MicrovmDatacenterConfig {
        MicrovmDatacenterConfig::new(
            "test1",
            MicrovmDatacenterConfigSpec {
                flintlock_url: url.to_string(),
                microvm_proxy: None,
                ssh_key: None,
            },
        )
    }

    fn configs(cluster: Cluster, machines: Vec<MicrovmMachineConfig>) -> ProviderConfigs {
        ProviderConfigs {
            cluster,
            datacenter: datacenter("10.10.0.1:9090"),
            machines: machines.into_iter().map(|m| (m.name_any(), m)).collect(),
        }
    }

    fn default_configs() -> ProviderConfigs {
        configs(
            cluster("cp-1", "worker-1"),
            vec![machine("cp-1", &["ssh-rsa CP"]), machine("worker-1", &["ssh-rsa W"])],
        )
    }

    fn provider_with(
        configs: ProviderConfigs,
        edition: ProviderEdition,
        client: MockProviderKubectlClient,
        env: Arc<MemoryEnv>,
    ) -> MicrovmProvider {
        MicrovmProvider::new(
            edition,
            configs,
            Arc::new(client),
            Arc::new(FixedClock::from_millis(NOW_MILLIS)),
            env,
        )
    }

    fn provider(configs: ProviderConfigs, env: Arc<MemoryEnv>) -> MicrovmProvider {
        provider_with(configs, ProviderEdition::Flintlock, MockProviderKubectlClient::new(), env)
    }

    fn cluster_spec(cluster: Cluster, bundle: i64, microvm_version: &str) -> ClusterSpec {
        let repo = |repository: &str, tag: &str| VersionedRepository {
            repository: repository.to_string(),
            tag: tag.to_string(),
        };
        ClusterSpec::new(
            cluster,
            BundleRelease {
                number: bundle,
                versions_bundle: VersionsBundle {
                    kube_version: "1.27".to_string(),
                    kube_distro: KubeDistro {
                        kubernetes: repo("public.ecr.aws/eks-distro/kubernetes", "v1.27.1"),
                        core_dns: repo("public.ecr.aws/eks-distro/coredns", "v1.10.1"),
                        etcd: repo("public.ecr.aws/eks-distro/etcd-io", "v3.5.8"),
                        etcd_version: "3.5.8".to_string(),
                    },
                    eks_d: EksDRelease {
                        kind_node: Image {
                            name: "kind-node".to_string(),
                            uri: "public.ecr.aws/kind/node:v1.27.1".to_string(),
                        },
                    },
                    microvm: MicrovmBundle {
                        version: microvm_version.to_string(),
                        components: Manifest {
                            uri: "components.yaml".to_string(),
                        },
                        metadata: Manifest {
                            uri: "metadata.yaml".to_string(),
                        },
                        cluster_template: Manifest {
                            uri: "cluster-template.yaml".to_string(),
                        },
                    },
                },
            },
        )
    }

    fn kube_cluster() -> KubeCluster {
        KubeCluster::new("test1", None)
    }

    mod identity {
        use super::*;

        #[test]
        fn test_static_surface() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            assert_eq!(p.name(), "microvm");
            assert_eq!(
                p.datacenter_resource_type(),
                "microvmdatacenterconfigs.anywhere.eks.amazonaws.com"
            );
            assert_eq!(p.machine_resource_type(), "");
            assert_eq!(
                p.deployments(),
                BTreeMap::from([(
                    "capmvm-system".to_string(),
                    vec!["capmvm-controller-manager".to_string()]
                )])
            );
            assert!(p.generate_storage_class().is_none());
            assert!(p.generate_mhc().expect("mhc").is_empty());
            assert_eq!(p.datacenter_config().spec.flintlock_url, "10.10.0.1:9090");
            assert_eq!(p.edition(), ProviderEdition::Flintlock);
        }

        #[test]
        fn test_version_and_bundle() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            assert_eq!(p.version(&spec), "v0.2.2");
            let bundle = p.infrastructure_bundle(&spec);
            assert_eq!(bundle.folder_name, "infrastructure-microvm/v0.2.2/");
            assert_eq!(
                bundle.manifests.iter().map(|m| m.uri.as_str()).collect::<Vec<_>>(),
                vec!["components.yaml", "metadata.yaml", "cluster-template.yaml"]
            );
        }

        #[test]
        fn test_bare_metal_bundle_has_no_cluster_template() {
            let p = provider_with(
                default_configs(),
                ProviderEdition::BareMetal,
                MockProviderKubectlClient::new(),
                Arc::new(MemoryEnv::new()),
            );
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");
            assert_eq!(p.infrastructure_bundle(&spec).manifests.len(), 2);
        }

        #[test]
        fn test_change_diff_delegates() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let old = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.1.0");
            let new = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.0");
            let diff = p.change_diff(&old, &new).expect("versions differ");
            assert_eq!(diff.old_version, "v0.1.0");
            assert!(p.change_diff(&new, &new).is_none());
        }
    }

    mod create_validation {
        use super::*;

        #[tokio::test]
        async fn test_valid_configs_publish_endpoint() {
            let env = Arc::new(MemoryEnv::new());
            let mut p = provider(default_configs(), env.clone());
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            p.setup_and_validate_create_cluster(&spec)
                .await
                .expect("valid configs should pass");

            assert_eq!(env.get("HOST_ENDPOINT").as_deref(), Some("10.10.0.1:9090"));
            assert_eq!(
                p.control_plane_ssh.as_ref().map(|s| s.authorized_key.as_str()),
                Some("ssh-rsa CP")
            );
            assert_eq!(
                p.worker_ssh.as_ref().map(|s| s.authorized_key.as_str()),
                Some("ssh-rsa W")
            );
        }

        #[tokio::test]
        async fn test_machine_without_users_leaves_env_untouched() {
            let env = Arc::new(MemoryEnv::new());
            let mut p = provider(
                configs(
                    cluster("cp-1", "worker-1"),
                    vec![machine("cp-1", &[]), machine("worker-1", &["ssh-rsa W"])],
                ),
                env.clone(),
            );
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            let err = p
                .setup_and_validate_create_cluster(&spec)
                .await
                .expect_err("cp-1 has no users");
            assert!(err.is_validation());
            assert!(env.snapshot().is_empty());
            assert!(p.control_plane_ssh.is_none());
        }

        #[tokio::test]
        async fn test_worker_without_keys_fails() {
            let env = Arc::new(MemoryEnv::new());
            let mut p = provider(
                configs(
                    cluster("cp-1", "worker-1"),
                    vec![machine("cp-1", &["ssh-rsa CP"]), machine("worker-1", &[])],
                ),
                env.clone(),
            );
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            let err = p
                .setup_and_validate_create_cluster(&spec)
                .await
                .expect_err("worker-1 has no keys");
            assert!(err.is_validation());
            assert!(env.get("HOST_ENDPOINT").is_none());
        }

        #[tokio::test]
        async fn test_unknown_machine_ref_fails() {
            let env = Arc::new(MemoryEnv::new());
            let mut p = provider(
                configs(cluster("cp-1", "missing"), vec![machine("cp-1", &["ssh-rsa CP"])]),
                env.clone(),
            );
            let spec = cluster_spec(cluster("cp-1", "missing"), 5, "v0.2.2");

            let err = p
                .setup_and_validate_create_cluster(&spec)
                .await
                .expect_err("worker ref does not resolve");
            assert!(err.to_string().contains("missing"));
            assert!(env.snapshot().is_empty());
        }

        #[tokio::test]
        async fn test_empty_endpoint_fails() {
            let env = Arc::new(MemoryEnv::new());
            let mut cfg = default_configs();
            cfg.datacenter = datacenter("");
            let mut p = provider(cfg, env.clone());
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            let err = p
                .setup_and_validate_create_cluster(&spec)
                .await
                .expect_err("endpoint is required");
            assert!(err.is_validation());
            assert!(env.snapshot().is_empty());
        }

        #[tokio::test]
        async fn test_enforced_single_control_plane() {
            let env = Arc::new(MemoryEnv::new());
            let mut cp = machine("cp-1", &["ssh-rsa CP"]);
            let mut other = machine("cp-2", &["ssh-rsa CP2"]);
            cp.set_control_plane();
            other.set_control_plane();
            let mut p = provider(
                configs(
                    cluster("cp-1", "worker-1"),
                    vec![cp, other, machine("worker-1", &["ssh-rsa W"])],
                ),
                env.clone(),
            )
            .with_capabilities(ProviderCapabilities {
                enforce_single_control_plane: true,
                ..ProviderEdition::Flintlock.capabilities()
            });
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            let err = p
                .setup_and_validate_create_cluster(&spec)
                .await
                .expect_err("two control plane configs");
            assert!(err.is_validation());
            assert!(env.snapshot().is_empty());
        }

        #[tokio::test]
        async fn test_bare_metal_publishes_hardware_endpoint() {
            let env = Arc::new(MemoryEnv::new());
            let mut p = provider_with(
                default_configs(),
                ProviderEdition::BareMetal,
                MockProviderKubectlClient::new(),
                env.clone(),
            );
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            p.setup_and_validate_create_cluster(&spec)
                .await
                .expect("valid configs should pass");
            assert!(env.get("HOST_ENDPOINT").is_none());
            assert_eq!(
                env.get("HARDWARE_HOST_ENDPOINT").as_deref(),
                Some("10.10.0.1:9090")
            );
        }

        #[tokio::test]
        async fn test_delete_republishes_endpoint() {
            let env = Arc::new(MemoryEnv::new());
            let p = provider(default_configs(), env.clone());
            p.setup_and_validate_delete_cluster()
                .await
                .expect("delete setup should pass");
            assert_eq!(env.get("HOST_ENDPOINT").as_deref(), Some("10.10.0.1:9090"));
        }
    }

    mod env_map {
        use super::*;

        #[test]
        fn test_reads_required_keys() {
            let env = Arc::new(MemoryEnv::with_vars([("HOST_ENDPOINT", "10.10.0.1:9090")]));
            let p = provider(default_configs(), env);
            let map = p.env_map().expect("env is set");
            assert_eq!(
                map,
                BTreeMap::from([("HOST_ENDPOINT".to_string(), "10.10.0.1:9090".to_string())])
            );
        }

        #[test]
        fn test_missing_key_fails() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let err = p.env_map().expect_err("HOST_ENDPOINT unset");
            assert!(err.to_string().contains("HOST_ENDPOINT"));
        }

        #[test]
        fn test_empty_key_fails() {
            let env = Arc::new(MemoryEnv::with_vars([("HOST_ENDPOINT", "")]));
            let p = provider(default_configs(), env);
            assert!(p.env_map().is_err());
        }
    }

    mod machine_configs {
        use super::*;

        #[test]
        fn test_distinct_configs_flagged() {
            let mut p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let configs = p.machine_configs().expect("refs resolve");

            assert_eq!(
                configs.iter().map(|c| c.name_any()).collect::<Vec<_>>(),
                vec!["cp-1", "worker-1"]
            );
            assert!(configs[0].is_control_plane());
            assert!(!configs[1].is_control_plane());
            assert!(!configs[0].is_management());
        }

        #[test]
        fn test_shared_config_listed_once() {
            let mut p = provider(
                configs(cluster("shared", "shared"), vec![machine("shared", &["ssh-rsa S"])]),
                Arc::new(MemoryEnv::new()),
            );
            let configs = p.machine_configs().expect("refs resolve");
            assert_eq!(configs.len(), 1);
            assert!(configs[0].is_control_plane());
        }

        #[test]
        fn test_managed_cluster_sets_management_on_both() {
            let mut c = cluster("cp-1", "worker-1");
            c.spec.management_cluster = Some(ManagementCluster {
                name: "mgmt".to_string(),
            });
            let mut p = provider(
                configs(c, vec![machine("cp-1", &["ssh-rsa CP"]), machine("worker-1", &["ssh-rsa W"])]),
                Arc::new(MemoryEnv::new()),
            );

            let configs = p.machine_configs().expect("refs resolve");
            assert!(configs.iter().all(|c| c.managed_by() == Some("mgmt")));
        }

        #[test]
        fn test_preserves_existing_annotations() {
            let mut cp = machine("cp-1", &["ssh-rsa CP"]);
            cp.annotations_mut()
                .insert("team".to_string(), "infra".to_string());
            let mut p = provider(
                configs(cluster("cp-1", "worker-1"), vec![cp, machine("worker-1", &["ssh-rsa W"])]),
                Arc::new(MemoryEnv::new()),
            );

            let configs = p.machine_configs().expect("refs resolve");
            let annotations = configs[0].annotations();
            assert_eq!(annotations.get("team").map(String::as_str), Some("infra"));
            assert_eq!(
                annotations.get(CONTROL_PLANE_ANNOTATION).map(String::as_str),
                Some("true")
            );
            assert!(!annotations.contains_key(MANAGEMENT_ANNOTATION));
        }

        #[test]
        fn test_unresolvable_ref_is_validation_error() {
            let mut p = provider(
                configs(cluster("cp-1", "worker-1"), vec![machine("cp-1", &["ssh-rsa CP"])]),
                Arc::new(MemoryEnv::new()),
            );
            let err = p.machine_configs().expect_err("worker-1 missing");
            assert!(err.is_validation());
            assert!(!p.machine_configs["cp-1"].is_control_plane());
        }
    }

    mod generation {
        use super::*;

        #[tokio::test]
        async fn test_generates_both_manifests() {
            let mut p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");
            p.setup_and_validate_create_cluster(&spec)
                .await
                .expect("valid configs should pass");

            let capi = p
                .generate_capi_spec_for_create(&kube_cluster(), &spec)
                .await
                .expect("manifests should render");
            let cp = String::from_utf8(capi.control_plane).expect("utf-8");
            let workers = String::from_utf8(capi.workers).expect("utf-8");

            assert!(cp.contains("name: test1-control-plane-template-1700000000000"));
            assert!(cp.contains("endpoint: 10.10.0.1:9090"));
            assert!(cp.contains("ssh-rsa CP"));
            assert!(!cp.contains("EtcdadmCluster"));
            assert!(workers.contains("name: test1-worker-node-template-1700000000000"));
            assert!(workers.contains("replicas: 2"));
            assert!(workers.contains("ssh-rsa W"));
        }

        #[tokio::test]
        async fn test_generates_without_cached_ssh_access() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");

            let capi = p
                .generate_capi_spec_for_create(&kube_cluster(), &spec)
                .await
                .expect("manifests should render");
            assert!(!String::from_utf8_lossy(&capi.control_plane).contains("sshAuthorizedKeys"));
        }

        #[tokio::test]
        async fn test_builder_errors_are_wrapped() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let mut c = cluster("cp-1", "worker-1");
            c.spec.worker_node_group_configurations.clear();
            let spec = cluster_spec(c, 5, "v0.2.2");

            let err = p
                .generate_capi_spec_for_create(&kube_cluster(), &spec)
                .await
                .expect_err("no worker groups");
            assert!(matches!(err, Error::Provider { .. }));
            assert!(err
                .to_string()
                .contains("error generating cluster api spec contents"));
        }

        #[tokio::test]
        async fn test_upgrade_generation_is_empty() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");
            let capi = p
                .generate_capi_spec_for_upgrade(&kube_cluster(), &kube_cluster(), &spec, &spec)
                .await
                .expect("placeholder");
            assert!(capi.is_empty());
        }
    }

    mod bootstrap {
        use super::*;

        #[test]
        fn test_without_proxy_env_is_empty() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            assert_eq!(
                p.bootstrap_cluster_opts().expect("opts"),
                vec![BootstrapClusterOption::Env(BTreeMap::new())]
            );
        }

        #[test]
        fn test_proxy_env() {
            let mut cfg = default_configs();
            cfg.cluster.spec.proxy_configuration = Some(ProxyConfiguration {
                http_proxy: "http://proxy:3128".to_string(),
                https_proxy: "https://proxy:3129".to_string(),
                no_proxy: vec!["".to_string(), ".svc".to_string()],
            });
            let p = provider(cfg, Arc::new(MemoryEnv::new()));

            let opts = p.bootstrap_cluster_opts().expect("opts");
            let BootstrapClusterOption::Env(env) = &opts[0];
            assert_eq!(env["HTTP_PROXY"], "http://proxy:3128");
            assert_eq!(env["HTTPS_PROXY"], "https://proxy:3129");
            assert_eq!(env["NO_PROXY"], "10.10.0.2,10.10.0.1:9090,.svc");
        }
    }

    mod noop_verbs {
        use super::*;

        #[tokio::test]
        async fn test_noop_verbs_succeed() {
            let p = provider(default_configs(), Arc::new(MemoryEnv::new()));
            let spec = cluster_spec(cluster("cp-1", "worker-1"), 5, "v0.2.2");
            let kc = kube_cluster();

            p.bootstrap_setup(&spec.cluster, &kc).await.expect("bootstrap setup");
            p.setup_and_validate_upgrade_cluster(&kc, &spec).await.expect("upgrade setup");
            p.update_secrets(&kc).await.expect("update secrets");
            p.validate_new_spec(&kc, &spec).await.expect("validate new spec");
            p.run_post_control_plane_creation(&spec, &kc).await.expect("post create");
            p.run_post_control_plane_upgrade(&spec, &spec, &kc, &kc).await.expect("post upgrade");
            p.delete_resources(&spec).await.expect("delete resources");
            assert!(!p.upgrade_needed(&spec, &spec).await.expect("upgrade needed"));

            let mut kubeconfig = b"apiVersion: v1".to_vec();
            p.update_kube_config(&mut kubeconfig, "test1").expect("kubeconfig");
            assert_eq!(kubeconfig, b"apiVersion: v1");
        }
    }

    mod readiness {
        use super::*;

        fn quick_retry() -> RetryConfig {
            RetryConfig::new(3, Duration::from_millis(1))
        }

        #[tokio::test]
        async fn test_retries_until_available() {
            let mut client = MockProviderKubectlClient::new();
            let mut calls = 0;
            client
                .expect_wait_for_deployment()
                .times(2)
                .returning(move |_, timeout, condition, target, namespace| {
                    assert_eq!(timeout, "5m");
                    assert_eq!(condition, "Available");
                    assert_eq!(target, "capmvm-controller-manager");
                    assert_eq!(namespace, "capmvm-system");
                    calls += 1;
                    if calls < 2 {
                        Err(Error::provider_for("test1", "deployment not ready"))
                    } else {
                        Ok(())
                    }
                });

            let p = provider_with(
                default_configs(),
                ProviderEdition::Flintlock,
                client,
                Arc::new(MemoryEnv::new()),
            )
            .with_retry_config(quick_retry());

            p.wait_for_deployment_ready(&kube_cluster(), CAPMVM_CONTROLLER_DEPLOYMENT, CAPMVM_NAMESPACE)
                .await
                .expect("second attempt succeeds");
        }

        #[tokio::test]
        async fn test_gives_up_after_max_attempts() {
            let mut client = MockProviderKubectlClient::new();
            client
                .expect_wait_for_deployment()
                .times(3)
                .returning(|_, _, _, _, _| Err(Error::provider_for("test1", "deployment not ready")));

            let p = provider_with(
                default_configs(),
                ProviderEdition::Flintlock,
                client,
                Arc::new(MemoryEnv::new()),
            )
            .with_retry_config(quick_retry());

            let err = p
                .wait_for_deployment_ready(&kube_cluster(), "cilium-operator", "kube-system")
                .await
                .expect_err("never becomes ready");
            assert!(err.to_string().contains("deployment not ready"));
        }
    }
}
