use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Affinity, ResourceRequirements, Toleration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1::{FileProbesSpec, HttpProbesSpec, ImageSpec, PrometheusSpec};

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsSpec {
    #[serde(default)]
    pub basic: BasicSpec,
    #[serde(default)]
    pub runtime_protection: RuntimeProtectionSpec,
    #[serde(default)]
    pub cluster_scanning: ClusterScanningSpec,
    #[serde(default)]
    pub settings: ComponentsSettings,
}

/// Components that are always installed
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasicSpec {
    #[serde(default)]
    pub monitor: MonitorSpec,
    #[serde(default)]
    pub enforcer: EnforcerSpec,
    #[serde(default)]
    pub state_reporter: StateReporterSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub deployment_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub image: ImageSpec,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub probes: HttpProbesSpec,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnforcerSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub deployment_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
    #[serde(default = "default_replicas_count")]
    pub replicas_count: i32,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub image: ImageSpec,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub probes: HttpProbesSpec,
    #[serde(default)]
    pub prometheus: PrometheusSpec,
    #[serde(default = "default_webhook_timeout_seconds")]
    pub webhook_timeout_seconds: i32,
    /// `Ignore` or `Fail`
    #[serde(default = "default_failure_policy")]
    pub failure_policy: String,
    /// Installs the mutating webhook when set
    #[serde(default = "default_true")]
    pub enable_enforcement_feature: bool,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
}

fn default_replicas_count() -> i32 {
    1
}
fn default_webhook_timeout_seconds() -> i32 {
    5
}
fn default_failure_policy() -> String {
    "Ignore".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for EnforcerSpec {
    fn default() -> Self {
        Self {
            labels: BTreeMap::new(),
            deployment_annotations: BTreeMap::new(),
            pod_template_annotations: BTreeMap::new(),
            replicas_count: default_replicas_count(),
            env: BTreeMap::new(),
            image: ImageSpec::default(),
            resources: ResourceRequirements::default(),
            probes: HttpProbesSpec::default(),
            prometheus: PrometheusSpec::default(),
            webhook_timeout_seconds: default_webhook_timeout_seconds(),
            failure_policy: default_failure_policy(),
            enable_enforcement_feature: true,
            node_selector: BTreeMap::new(),
            affinity: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateReporterSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub deployment_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub image: ImageSpec,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub probes: HttpProbesSpec,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeProtectionSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub resolver: ResolverSpec,
    #[serde(default)]
    pub sensor: SensorSpec,
    #[serde(default = "default_internal_grpc_port")]
    pub internal_grpc_port: i32,
}

fn default_internal_grpc_port() -> i32 {
    8080
}

impl Default for RuntimeProtectionSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            resolver: ResolverSpec::default(),
            sensor: SensorSpec::default(),
            internal_grpc_port: default_internal_grpc_port(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolverSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub deployment_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
    /// Derived from the node count when unset
    #[serde(default)]
    pub replicas_count: Option<i32>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub image: ImageSpec,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub probes: HttpProbesSpec,
    #[serde(default)]
    pub prometheus: PrometheusSpec,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// One resolver replica per this many nodes
    #[serde(default = "default_nodes_to_replicas_ratio")]
    pub nodes_to_replicas_ratio: i32,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_nodes_to_replicas_ratio() -> i32 {
    3
}

impl Default for ResolverSpec {
    fn default() -> Self {
        Self {
            labels: BTreeMap::new(),
            deployment_annotations: BTreeMap::new(),
            pod_template_annotations: BTreeMap::new(),
            replicas_count: None,
            env: BTreeMap::new(),
            image: ImageSpec::default(),
            resources: ResourceRequirements::default(),
            probes: HttpProbesSpec::default(),
            prometheus: PrometheusSpec::default(),
            node_selector: BTreeMap::new(),
            affinity: None,
            log_level: default_log_level(),
            nodes_to_replicas_ratio: default_nodes_to_replicas_ratio(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensorSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub daemon_set_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub image: ImageSpec,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub probes: FileProbesSpec,
    #[serde(default)]
    pub prometheus: PrometheusSpec,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SensorSpec {
    fn default() -> Self {
        Self {
            labels: BTreeMap::new(),
            daemon_set_annotations: BTreeMap::new(),
            pod_template_annotations: BTreeMap::new(),
            env: BTreeMap::new(),
            image: ImageSpec::default(),
            resources: ResourceRequirements::default(),
            probes: FileProbesSpec::default(),
            prometheus: PrometheusSpec::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScanningSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub image_scanning_reporter: ImageScanningReporterSpec,
    #[serde(default)]
    pub cluster_scanner: ClusterScannerSpec,
}

impl Default for ClusterScanningSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            image_scanning_reporter: ImageScanningReporterSpec::default(),
            cluster_scanner: ClusterScannerSpec::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageScanningReporterSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub deployment_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
    #[serde(default = "default_replicas_count")]
    pub replicas_count: i32,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub image: ImageSpec,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub probes: HttpProbesSpec,
    #[serde(default)]
    pub prometheus: PrometheusSpec,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
}

impl Default for ImageScanningReporterSpec {
    fn default() -> Self {
        Self {
            labels: BTreeMap::new(),
            deployment_annotations: BTreeMap::new(),
            pod_template_annotations: BTreeMap::new(),
            replicas_count: default_replicas_count(),
            env: BTreeMap::new(),
            image: ImageSpec::default(),
            resources: ResourceRequirements::default(),
            probes: HttpProbesSpec::default(),
            prometheus: PrometheusSpec::default(),
            node_selector: BTreeMap::new(),
            affinity: None,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScannerSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub daemon_set_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub pod_template_annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub image: ImageSpec,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub probes: FileProbesSpec,
    #[serde(default)]
    pub prometheus: PrometheusSpec,
    #[serde(default)]
    pub k8s_container_engine: K8sContainerEngineSpec,
    #[serde(default)]
    pub cli_flags: CliFlags,
}

pub const SUPPORTED_ENGINE_TYPES: [&str; 3] = ["containerd", "docker-daemon", "cri-o"];

/// A container engine endpoint outside the well-known socket paths
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct K8sContainerEngineSpec {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub engine_type: String,
    #[serde(default, rename = "CRIO")]
    pub crio: CrioSpec,
}

impl K8sContainerEngineSpec {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() || !self.engine_type.is_empty()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrioSpec {
    /// Host path of the containers/storage image store
    #[serde(default)]
    pub storage_path: String,
    /// Host path of storage.conf
    #[serde(default)]
    pub storage_config_path: String,
    /// Host path of crio.conf
    #[serde(default)]
    pub config_path: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CliFlags {
    #[serde(default)]
    pub skip_secrets_detection: bool,
    #[serde(default)]
    pub skip_dirs_or_files: Vec<String>,
    #[serde(default)]
    pub scan_base_layer: bool,
    #[serde(default)]
    pub ignore_built_in_regex: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsSettings {
    /// Applied to every DaemonSet; defaults to tolerating everything
    #[serde(default)]
    pub daemon_sets_tolerations: Vec<Toleration>,
    #[serde(default = "default_true")]
    pub create_default_image_pull_secrets: bool,
    #[serde(default)]
    pub image_pull_secrets: Vec<String>,
    #[serde(default)]
    pub default_images_registry: Option<String>,
    #[serde(default)]
    pub proxy: ProxySettings,
}

impl Default for ComponentsSettings {
    fn default() -> Self {
        Self {
            daemon_sets_tolerations: Vec::new(),
            create_default_image_pull_secrets: true,
            image_pull_secrets: Vec::new(),
            default_images_registry: None,
            proxy: ProxySettings::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
    #[serde(default)]
    pub no_proxy: Option<String>,
    /// Appended to `noProxy`, comma separated
    #[serde(default)]
    pub no_proxy_suffix: Option<String>,
}
