use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ResourceRequirements, Toleration};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::api::v1::components::SUPPORTED_ENGINE_TYPES;
use crate::api::v1::{ImageSpec, PrometheusSpec};
use crate::util::errors::{Error, Result, StdError};

const DEFAULT_PROMETHEUS_PORT: i32 = 7071;
const CLUSTER_SCANNER_PROMETHEUS_PORT: i32 = 7072;

pub const CRIO_DEFAULT_STORAGE_PATH: &str = "/var/lib/containers";
pub const CRIO_DEFAULT_STORAGE_CONFIG_PATH: &str = "/etc/containers/storage.conf";
pub const CRIO_DEFAULT_CONFIG_PATH: &str = "/etc/crio/crio.conf";

impl CBContainersAgentSpec {
    /// Fills the per-component defaults that serde cannot express with a single default
    /// function: image repositories, resource requests/limits and prometheus ports.
    pub fn apply_defaults(&mut self) {
        let basic = &mut self.components.basic;
        set_default_image(&mut basic.monitor.image, "cbartifactory/monitor");
        set_default_resources(&mut basic.monitor.resources, ("64Mi", "30m"), ("256Mi", "200m"));

        set_default_image(&mut basic.enforcer.image, "cbartifactory/guardrails-enforcer");
        set_default_resources(&mut basic.enforcer.resources, ("64Mi", "30m"), ("256Mi", "200m"));
        set_default_prometheus_port(&mut basic.enforcer.prometheus, DEFAULT_PROMETHEUS_PORT);

        set_default_image(&mut basic.state_reporter.image, "cbartifactory/guardrails-state-reporter");
        set_default_resources(
            &mut basic.state_reporter.resources,
            ("64Mi", "30m"),
            ("256Mi", "200m"),
        );

        let runtime = &mut self.components.runtime_protection;
        set_default_image(&mut runtime.resolver.image, "cbartifactory/runtime-kubernetes-resolver");
        set_default_resources(&mut runtime.resolver.resources, ("64Mi", "200m"), ("1024Mi", "900m"));
        set_default_prometheus_port(&mut runtime.resolver.prometheus, DEFAULT_PROMETHEUS_PORT);

        set_default_image(&mut runtime.sensor.image, "cbartifactory/runtime-kubernetes-sensor");
        set_default_resources(&mut runtime.sensor.resources, ("64Mi", "30m"), ("1024Mi", "500m"));
        set_default_prometheus_port(&mut runtime.sensor.prometheus, DEFAULT_PROMETHEUS_PORT);

        let scanning = &mut self.components.cluster_scanning;
        let reporter = &mut scanning.image_scanning_reporter;
        set_default_image(&mut reporter.image, "cbartifactory/image-scanning-reporter");
        set_default_resources(&mut reporter.resources, ("64Mi", "200m"), ("1024Mi", "900m"));
        set_default_prometheus_port(&mut reporter.prometheus, DEFAULT_PROMETHEUS_PORT);

        let scanner = &mut scanning.cluster_scanner;
        set_default_image(&mut scanner.image, "cbartifactory/cluster-scanner");
        set_default_resources(&mut scanner.resources, ("64Mi", "30m"), ("4Gi", "2000m"));
        set_default_prometheus_port(&mut scanner.prometheus, CLUSTER_SCANNER_PROMETHEUS_PORT);

        let crio = &mut scanner.k8s_container_engine.crio;
        set_default_string(&mut crio.storage_path, CRIO_DEFAULT_STORAGE_PATH);
        set_default_string(&mut crio.storage_config_path, CRIO_DEFAULT_STORAGE_CONFIG_PATH);
        set_default_string(&mut crio.config_path, CRIO_DEFAULT_CONFIG_PATH);

        let settings = &mut self.components.settings;
        if settings.daemon_sets_tolerations.is_empty() {
            settings.daemon_sets_tolerations = vec![Toleration {
                operator: Some("Exists".to_string()),
                ..Default::default()
            }];
        }
    }

    /// Rejects combinations the dataplane cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::StdError(StdError::InvalidArgument(message)));

        if self.account.is_empty() {
            return invalid("account must be provided".to_string());
        }
        if self.cluster_name.is_empty() {
            return invalid("clusterName must be provided".to_string());
        }

        let enforcer = &self.components.basic.enforcer;
        if enforcer.failure_policy != "Ignore" && enforcer.failure_policy != "Fail" {
            return invalid(format!(
                "invalid enforcer failure policy {}",
                enforcer.failure_policy
            ));
        }

        let engine = &self.components.cluster_scanning.cluster_scanner.k8s_container_engine;
        if engine.is_configured() {
            if engine.endpoint.is_empty() {
                return invalid(
                    "k8s container engine endpoint must be provided if configuring k8s container engine option"
                        .to_string(),
                );
            }
            if engine.engine_type.is_empty() {
                return invalid(
                    "k8s container engine type must be provided if configuring k8s container engine option"
                        .to_string(),
                );
            }
            if !SUPPORTED_ENGINE_TYPES.contains(&engine.engine_type.as_str()) {
                return invalid(format!("invalid engine type {} provided", engine.engine_type));
            }
        }

        Ok(())
    }
}

fn set_default_image(image: &mut ImageSpec, repository: &str) {
    set_default_string(&mut image.repository, repository);
    set_default_string(&mut image.pull_policy, "IfNotPresent");
}

fn set_default_string(value: &mut String, default: &str) {
    if value.is_empty() {
        *value = default.to_string();
    }
}

fn set_default_prometheus_port(prometheus: &mut PrometheusSpec, port: i32) {
    if prometheus.port == 0 {
        prometheus.port = port;
    }
}

fn set_default_resources(
    resources: &mut ResourceRequirements,
    requests: (&str, &str),
    limits: (&str, &str),
) {
    set_default_resource_list(resources.requests.get_or_insert_with(BTreeMap::new), requests);
    set_default_resource_list(resources.limits.get_or_insert_with(BTreeMap::new), limits);
}

fn set_default_resource_list(list: &mut BTreeMap<String, Quantity>, (memory, cpu): (&str, &str)) {
    list.entry("memory".to_string())
        .or_insert_with(|| Quantity(memory.to_string()));
    list.entry("cpu".to_string())
        .or_insert_with(|| Quantity(cpu.to_string()));
}
