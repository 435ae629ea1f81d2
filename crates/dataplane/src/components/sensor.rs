//! The node agent: one DaemonSet hosting the runtime sensor, the cluster scanner, or both.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec};

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::api::v1::components::ClusterScannerSpec;
use crate::api::v1::defaults::{CRIO_DEFAULT_CONFIG_PATH, CRIO_DEFAULT_STORAGE_CONFIG_PATH, CRIO_DEFAULT_STORAGE_PATH};
use crate::applier::DesiredObject;
use crate::mutators::container::{
    find_container_mut, mutate_file_probes, mutate_image, mutate_resources, mutate_single_port, remove_ports,
};
use crate::mutators::env::{mutate_env_vars, EnvVarBuilder};
use crate::mutators::node_terms::NodeTermsBuilder;
use crate::mutators::pod::{desired_labels, mutate_annotations, mutate_image_pull_secrets, mutate_workload_labels};
use crate::mutators::volumes::{
    mutate_host_path_volume, mutate_volume_mount, mutate_volume_mount_to_include_root_cas,
    mutate_volumes_to_include_root_cas, reset_volume_mounts_unless_count, reset_volumes_unless_count,
};
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::Result;

use super::consts::{
    service_address, AGENT_NODE_SERVICE_ACCOUNT_NAME, CLUSTER_SCANNER_CONTAINER_NAME, DAEMON_SET_NAME,
    DATAPLANE_PRIORITY_CLASS_NAME, HTTPS_PORT_NAME, IMAGE_SCANNING_REPORTER_CONTAINER_PORT,
    IMAGE_SCANNING_REPORTER_NAME, METRICS_PORT_NAME, PROMETHEUS_SCRAPE_ANNOTATION, RESOLVER_NAME,
    RUNTIME_CONTAINER_NAME,
};
use super::mutate_privileged_security_context;

const RUNTIME_SENSOR_RUN_COMMAND: &str = "/run_sensor.sh";
const RESOLVER_CONNECTION_TIMEOUT_SECONDS: i32 = 60;

const DEFAULT_DNS_POLICY: &str = "ClusterFirst";
const HOST_NETWORK_DNS_POLICY: &str = "ClusterFirstWithHostNet";

/// Well known container runtime sockets, mounted read-only into the scanner. Volume name
/// first, socket path second.
const SUPPORTED_CONTAINER_RUNTIMES: [(&str, &str); 6] = [
    ("containerd", "/var/run/containerd/containerd.sock"),
    ("microk8s-containerd", "/var/snap/microk8s/common/run/containerd.sock"),
    ("k3s-containerd", "/run/k3s/containerd/containerd.sock"),
    ("docker", "/var/run/dockershim.sock"),
    ("crio", "/var/run/crio/crio.sock"),
    ("dockersock", "/var/run/docker.sock"),
];

/// Holds a socket path the user configured outside the well known ones.
const CONFIGURED_CONTAINER_RUNTIME_VOLUME_NAME: &str = "configured-container-runtime-endpoint";

const CRIO_STORAGE_VOLUME_NAME: &str = "crio-storage";
const CRIO_STORAGE_CONFIG_VOLUME_NAME: &str = "crio-storage-config";
const CRIO_CONFIG_VOLUME_NAME: &str = "crio-config";

#[derive(Default)]
pub struct SensorDaemonSet;

impl DesiredObject for SensorDaemonSet {
    fn empty_object(&self) -> K8sObject {
        K8sObject::DaemonSet(DaemonSet::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, DAEMON_SET_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let daemon_set = object.as_daemon_set_mut()?;
        let runtime_enabled = spec.components.runtime_protection.enabled;
        let scanning_enabled = spec.components.cluster_scanning.enabled;

        let daemon_set_spec = daemon_set.spec.get_or_insert_with(DaemonSetSpec::default);
        mutate_workload_labels(
            &mut daemon_set.metadata,
            &mut daemon_set_spec.selector,
            &mut daemon_set_spec.template,
            &labels(spec),
        );
        let (object_annotations, template_annotations) = annotations(spec);
        mutate_annotations(
            &mut daemon_set.metadata,
            &mut daemon_set_spec.template,
            &object_annotations,
            &template_annotations,
        );

        let pod_spec = daemon_set_spec.template.spec.get_or_insert_with(PodSpec::default);
        pod_spec.service_account_name = Some(AGENT_NODE_SERVICE_ACCOUNT_NAME.to_string());
        pod_spec.priority_class_name = Some(DATAPLANE_PRIORITY_CLASS_NAME.to_string());
        mutate_image_pull_secrets(
            pod_spec,
            spec,
            &spec.components.runtime_protection.sensor.image.pull_secrets,
        );

        // the sensor watches the node's processes and network from the host namespaces
        pod_spec.dns_policy = Some(
            if runtime_enabled { HOST_NETWORK_DNS_POLICY } else { DEFAULT_DNS_POLICY }.to_string(),
        );
        pod_spec.host_network = runtime_enabled.then_some(true);
        pod_spec.host_pid = runtime_enabled.then_some(true);

        mutate_volumes(pod_spec, spec);
        pod_spec.tolerations =
            Some(spec.components.settings.daemon_sets_tolerations.clone()).filter(|t| !t.is_empty());

        mutate_containers_list(pod_spec, runtime_enabled, scanning_enabled);
        if let Some(container) = find_container_mut(pod_spec, RUNTIME_CONTAINER_NAME) {
            mutate_runtime_container(container, spec);
        }
        if let Some(container) = find_container_mut(pod_spec, CLUSTER_SCANNER_CONTAINER_NAME) {
            mutate_cluster_scanner_container(container, spec);
        }

        NodeTermsBuilder::new().build(pod_spec);
        Ok(())
    }
}

/// The app label, plus the labels of every enabled component.
fn labels(spec: &CBContainersAgentSpec) -> BTreeMap<String, String> {
    let mut extra = BTreeMap::new();
    if spec.components.runtime_protection.enabled {
        extra.extend(spec.components.runtime_protection.sensor.labels.clone());
    }
    if spec.components.cluster_scanning.enabled {
        extra.extend(spec.components.cluster_scanning.cluster_scanner.labels.clone());
    }
    desired_labels(DAEMON_SET_NAME, &extra)
}

/// Object and template annotations of every enabled component. The pod is marked for
/// scraping as soon as one of them exports metrics.
fn annotations(spec: &CBContainersAgentSpec) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut object_annotations = BTreeMap::new();
    let mut template_annotations = BTreeMap::new();
    let mut prometheus_enabled = false;

    let runtime = &spec.components.runtime_protection;
    if runtime.enabled {
        object_annotations.extend(runtime.sensor.daemon_set_annotations.clone());
        template_annotations.extend(runtime.sensor.pod_template_annotations.clone());
        prometheus_enabled |= runtime.sensor.prometheus.enabled;
    }

    let scanning = &spec.components.cluster_scanning;
    if scanning.enabled {
        object_annotations.extend(scanning.cluster_scanner.daemon_set_annotations.clone());
        template_annotations.extend(scanning.cluster_scanner.pod_template_annotations.clone());
        prometheus_enabled |= scanning.cluster_scanner.prometheus.enabled;
    }

    if prometheus_enabled {
        template_annotations.insert(PROMETHEUS_SCRAPE_ANNOTATION.to_string(), "true".to_string());
    }
    (object_annotations, template_annotations)
}

/// Socket paths the scanner reads running containers from, the configured endpoint included.
fn container_runtimes(scanner: &ClusterScannerSpec) -> Vec<(&str, &str)> {
    let mut runtimes: Vec<(&str, &str)> = SUPPORTED_CONTAINER_RUNTIMES.to_vec();
    let endpoint = scanner.k8s_container_engine.endpoint.as_str();
    if !endpoint.is_empty() {
        runtimes.push((CONFIGURED_CONTAINER_RUNTIME_VOLUME_NAME, endpoint));
    }
    runtimes
}

/// Only the scanner mounts anything: runtime sockets, the CRI-O storage trio and root CAs.
fn mutate_volumes(pod_spec: &mut PodSpec, spec: &CBContainersAgentSpec) {
    let scanning = &spec.components.cluster_scanning;
    if !scanning.enabled {
        pod_spec.volumes = None;
        return;
    }

    let scanner = &scanning.cluster_scanner;
    let runtimes = container_runtimes(scanner);
    reset_volumes_unless_count(pod_spec, runtimes.len() + 3 + 1);
    for (name, path) in &runtimes {
        mutate_host_path_volume(pod_spec, name, path);
    }

    let crio = &scanner.k8s_container_engine.crio;
    mutate_host_path_volume(pod_spec, CRIO_STORAGE_VOLUME_NAME, &crio.storage_path);
    mutate_host_path_volume(pod_spec, CRIO_STORAGE_CONFIG_VOLUME_NAME, &crio.storage_config_path);
    mutate_host_path_volume(pod_spec, CRIO_CONFIG_VOLUME_NAME, &crio.config_path);
    mutate_volumes_to_include_root_cas(pod_spec);
}

/// Keeps the containers of the enabled components, runtime first, and carries each one
/// over from the stored pod template when present. The list is only rebuilt when a wanted
/// container is missing or an unwanted one is left, so server defaults on kept containers
/// survive.
fn mutate_containers_list(pod_spec: &mut PodSpec, runtime_enabled: bool, scanning_enabled: bool) {
    let wanted: Vec<&str> = [
        (runtime_enabled, RUNTIME_CONTAINER_NAME),
        (scanning_enabled, CLUSTER_SCANNER_CONTAINER_NAME),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect();

    let containers = &pod_spec.containers;
    let all_present = wanted.iter().all(|name| containers.iter().any(|c| c.name == *name));
    if containers.len() == wanted.len() && all_present {
        return;
    }

    let mut existing = std::mem::take(&mut pod_spec.containers);
    pod_spec.containers = wanted
        .into_iter()
        .map(|name| match existing.iter().position(|c| c.name == name) {
            Some(index) => existing.swap_remove(index),
            None => Container {
                name: name.to_string(),
                ..Default::default()
            },
        })
        .collect();
}

fn mutate_runtime_container(container: &mut Container, spec: &CBContainersAgentSpec) {
    let runtime = &spec.components.runtime_protection;
    let sensor = &runtime.sensor;

    mutate_resources(container, &sensor.resources);
    container.command = Some(vec![RUNTIME_SENSOR_RUN_COMMAND.to_string()]);
    mutate_image(
        container,
        &sensor.image,
        &spec.version,
        spec.components.settings.default_images_registry.as_deref(),
    );
    mutate_file_probes(container, &sensor.probes);
    if sensor.prometheus.enabled {
        mutate_single_port(container, METRICS_PORT_NAME, sensor.prometheus.port);
    } else {
        remove_ports(container);
    }

    let env = EnvVarBuilder::new()
        .with_value("RUNTIME_KUBERNETES_SENSOR_GRPC_PORT", runtime.internal_grpc_port)
        .with_value(
            "RUNTIME_KUBERNETES_SENSOR_RESOLVER_ADDRESS",
            service_address(RESOLVER_NAME, &spec.namespace),
        )
        .with_value(
            "RUNTIME_KUBERNETES_SENSOR_RESOLVER_CONNECTION_TIMEOUT_SECONDS",
            RESOLVER_CONNECTION_TIMEOUT_SECONDS,
        )
        .with_value("RUNTIME_KUBERNETES_SENSOR_LIVENESS_PATH", &sensor.probes.liveness_path)
        .with_value("RUNTIME_KUBERNETES_SENSOR_READINESS_PATH", &sensor.probes.readiness_path)
        .with_value("RUNTIME_KUBERNETES_SENSOR_LOG_LEVEL", &sensor.log_level)
        .with_proxy_settings(&spec.components.settings.proxy)
        .with_spec(&sensor.env);
    mutate_env_vars(container, &env);
    mutate_privileged_security_context(container);
}

fn mutate_cluster_scanner_container(container: &mut Container, spec: &CBContainersAgentSpec) {
    let scanner = &spec.components.cluster_scanning.cluster_scanner;

    mutate_resources(container, &scanner.resources);
    mutate_image(
        container,
        &scanner.image,
        &spec.version,
        spec.components.settings.default_images_registry.as_deref(),
    );
    mutate_file_probes(container, &scanner.probes);
    if scanner.prometheus.enabled {
        mutate_single_port(container, METRICS_PORT_NAME, scanner.prometheus.port);
    } else {
        remove_ports(container);
    }

    let cli_flags = &scanner.cli_flags;
    let mut env = EnvVarBuilder::new()
        .with_common_data_plane(&spec.access_token_secret_name)
        .with_events_gateway(&spec.gateways.hardening_events_gateway)
        .with_value("CLUSTER_SCANNER_PROMETHEUS_PORT", scanner.prometheus.port)
        .with_value(
            "CLUSTER_SCANNER_IMAGE_SCANNING_REPORTER_HOST",
            service_address(IMAGE_SCANNING_REPORTER_NAME, &spec.namespace),
        )
        .with_value(
            "CLUSTER_SCANNER_IMAGE_SCANNING_REPORTER_PORT",
            IMAGE_SCANNING_REPORTER_CONTAINER_PORT,
        )
        .with_value("CLUSTER_SCANNER_IMAGE_SCANNING_REPORTER_SCHEME", HTTPS_PORT_NAME)
        .with_value("CLUSTER_SCANNER_LIVENESS_PATH", &scanner.probes.liveness_path)
        .with_value("CLUSTER_SCANNER_READINESS_PATH", &scanner.probes.readiness_path)
        .with_value(
            "CLUSTER_SCANNER_CLI_FLAGS_SKIP_SECRETS_DETECTION",
            cli_flags.skip_secrets_detection,
        )
        .with_value(
            "CLUSTER_SCANNER_CLI_FLAGS_SKIP_DIRS_OR_FILES",
            cli_flags.skip_dirs_or_files.join(","),
        )
        .with_value("CLUSTER_SCANNER_CLI_FLAGS_SCAN_BASE_LAYER", cli_flags.scan_base_layer)
        .with_value(
            "CLUSTER_SCANNER_CLI_FLAGS_IGNORE_BUILT_IN_REGEX",
            cli_flags.ignore_built_in_regex,
        );
    let engine = &scanner.k8s_container_engine;
    if !engine.endpoint.is_empty() && !engine.engine_type.is_empty() {
        env = env
            .with_value("CLUSTER_SCANNER_ENDPOINT", &engine.endpoint)
            .with_value("CLUSTER_SCANNER_CONTAINER_RUNTIME", &engine.engine_type);
    }
    let env = env
        .with_env_var_from_resource("CLUSTER_SCANNER_LIMITS_MEMORY", CLUSTER_SCANNER_CONTAINER_NAME, "limits.memory")
        .with_env_var_from_resource(
            "CLUSTER_SCANNER_REQUESTS_MEMORY",
            CLUSTER_SCANNER_CONTAINER_NAME,
            "requests.memory",
        )
        .with_env_var_from_field("CLUSTER_SCANNER_NODE_NAME", "spec.nodeName", "v1")
        .with_gateway_tls()
        .with_proxy_settings(&spec.components.settings.proxy)
        .with_spec(&scanner.env);
    mutate_env_vars(container, &env);

    let runtimes = container_runtimes(scanner);
    reset_volume_mounts_unless_count(container, runtimes.len() + 3 + 1);
    mutate_volume_mount_to_include_root_cas(container);
    for (name, path) in &runtimes {
        mutate_volume_mount(container, name, path, true);
    }
    // CRI-O and the scanner share file based locks in the image store
    mutate_volume_mount(container, CRIO_STORAGE_VOLUME_NAME, CRIO_DEFAULT_STORAGE_PATH, false);
    mutate_volume_mount(
        container,
        CRIO_STORAGE_CONFIG_VOLUME_NAME,
        CRIO_DEFAULT_STORAGE_CONFIG_PATH,
        true,
    );
    mutate_volume_mount(
        container,
        CRIO_CONFIG_VOLUME_NAME,
        CRIO_DEFAULT_CONFIG_PATH,
        true,
    );

    mutate_privileged_security_context(container);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutators::container::full_image;
    use crate::tests::{env_value, sample_spec};

    fn mutated(spec: &CBContainersAgentSpec, object: &mut K8sObject) -> PodSpec {
        SensorDaemonSet.mutate(object, spec).unwrap();
        object
            .as_daemon_set()
            .unwrap()
            .spec
            .clone()
            .unwrap()
            .template
            .spec
            .unwrap()
    }

    fn container_names(pod_spec: &PodSpec) -> Vec<&str> {
        pod_spec.containers.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_both_components_enabled() {
        let spec = sample_spec();
        let mut object = SensorDaemonSet.empty_object();
        let pod_spec = mutated(&spec, &mut object);

        assert_eq!(container_names(&pod_spec), [RUNTIME_CONTAINER_NAME, CLUSTER_SCANNER_CONTAINER_NAME]);
        assert_eq!(pod_spec.host_network, Some(true));
        assert_eq!(pod_spec.host_pid, Some(true));
        assert_eq!(pod_spec.dns_policy.as_deref(), Some("ClusterFirstWithHostNet"));
        assert_eq!(pod_spec.volumes.as_ref().unwrap().len(), 10);
        assert_eq!(pod_spec.tolerations.as_ref().unwrap().len(), 1);

        let runtime = &pod_spec.containers[0];
        assert_eq!(runtime.command.as_deref(), Some(&["/run_sensor.sh".to_string()][..]));
        assert!(runtime.volume_mounts.is_none());
        assert_eq!(
            env_value(runtime.env.as_deref().unwrap(), "RUNTIME_KUBERNETES_SENSOR_RESOLVER_ADDRESS"),
            Some("cbcontainers-runtime-resolver.cbcontainers-dataplane.svc.cluster.local")
        );

        let scanner = &pod_spec.containers[1];
        let env = scanner.env.as_deref().unwrap();
        assert_eq!(
            env_value(env, "CLUSTER_SCANNER_IMAGE_SCANNING_REPORTER_HOST"),
            Some("cbcontainers-image-scanning-reporter.cbcontainers-dataplane.svc.cluster.local")
        );
        assert_eq!(env_value(env, "CLUSTER_SCANNER_CLI_FLAGS_SCAN_BASE_LAYER"), Some("false"));
        assert!(env_value(env, "CLUSTER_SCANNER_ENDPOINT").is_none());
        let mounts = scanner.volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 10);
        let storage = mounts.iter().find(|m| m.name == "crio-storage").unwrap();
        assert_eq!(storage.read_only, Some(false));
        assert_eq!(scanner.security_context.as_ref().unwrap().privileged, Some(true));
    }

    #[test]
    fn test_component_swap_keeps_matching_container() {
        let mut spec = sample_spec();
        spec.components.cluster_scanning.enabled = false;
        let mut object = SensorDaemonSet.empty_object();
        let pod_spec = mutated(&spec, &mut object);
        assert_eq!(container_names(&pod_spec), [RUNTIME_CONTAINER_NAME]);
        assert!(pod_spec.volumes.is_none());

        // a server defaulted field on the runtime container must survive the swap
        let template = object.as_daemon_set_mut().unwrap().spec.as_mut().unwrap();
        template.template.spec.as_mut().unwrap().containers[0].termination_message_path =
            Some("/dev/termination-log".to_string());

        spec.components.cluster_scanning.enabled = true;
        let pod_spec = mutated(&spec, &mut object);
        assert_eq!(container_names(&pod_spec), [RUNTIME_CONTAINER_NAME, CLUSTER_SCANNER_CONTAINER_NAME]);
        assert_eq!(
            pod_spec.containers[0].termination_message_path.as_deref(),
            Some("/dev/termination-log")
        );

        spec.components.runtime_protection.enabled = false;
        let pod_spec = mutated(&spec, &mut object);
        assert_eq!(container_names(&pod_spec), [CLUSTER_SCANNER_CONTAINER_NAME]);
        assert_eq!(pod_spec.host_network, None);
        assert_eq!(pod_spec.dns_policy.as_deref(), Some("ClusterFirst"));
    }

    #[test]
    fn test_runtime_container_replaced_by_scanner() {
        let mut spec = sample_spec();
        spec.components.cluster_scanning.enabled = false;
        let mut object = SensorDaemonSet.empty_object();
        let pod_spec = mutated(&spec, &mut object);
        assert_eq!(container_names(&pod_spec), [RUNTIME_CONTAINER_NAME]);

        spec.components.runtime_protection.enabled = false;
        spec.components.cluster_scanning.enabled = true;
        let pod_spec = mutated(&spec, &mut object);
        assert_eq!(container_names(&pod_spec), [CLUSTER_SCANNER_CONTAINER_NAME]);

        let scanner = &pod_spec.containers[0];
        let scanner_spec = &spec.components.cluster_scanning.cluster_scanner;
        assert_eq!(
            scanner.image.as_deref(),
            Some(full_image(&scanner_spec.image, &spec.version, None).as_str())
        );
        assert_eq!(scanner.command, None);
        let readiness = scanner.readiness_probe.as_ref().unwrap().exec.as_ref().unwrap();
        assert_eq!(
            readiness.command.as_deref(),
            Some(&["cat".to_string(), scanner_spec.probes.readiness_path.clone()][..])
        );

        let env = scanner.env.as_deref().unwrap();
        assert_eq!(
            env_value(env, "CLUSTER_SCANNER_READINESS_PATH"),
            Some(scanner_spec.probes.readiness_path.as_str())
        );
        assert!(env.iter().all(|e| !e.name.starts_with("RUNTIME_KUBERNETES_SENSOR_")));
        assert_eq!(scanner.volume_mounts.as_ref().unwrap().len(), 10);

        let once = object.clone();
        mutated(&spec, &mut object);
        assert_eq!(object, once);
    }

    #[test]
    fn test_configured_engine_endpoint() {
        let mut spec = sample_spec();
        let engine = &mut spec.components.cluster_scanning.cluster_scanner.k8s_container_engine;
        engine.endpoint = "/custom/containerd.sock".to_string();
        engine.engine_type = "containerd".to_string();

        let mut object = SensorDaemonSet.empty_object();
        let pod_spec = mutated(&spec, &mut object);
        assert_eq!(pod_spec.volumes.as_ref().unwrap().len(), 11);
        let scanner = &pod_spec.containers[1];
        let env = scanner.env.as_deref().unwrap();
        assert_eq!(env_value(env, "CLUSTER_SCANNER_ENDPOINT"), Some("/custom/containerd.sock"));
        assert_eq!(env_value(env, "CLUSTER_SCANNER_CONTAINER_RUNTIME"), Some("containerd"));
        let mount = scanner
            .volume_mounts
            .as_ref()
            .unwrap()
            .iter()
            .find(|m| m.name == CONFIGURED_CONTAINER_RUNTIME_VOLUME_NAME)
            .unwrap();
        assert_eq!(mount.mount_path, "/custom/containerd.sock");
    }

    #[test]
    fn test_labels_and_annotations_follow_enabled_components() {
        let mut spec = sample_spec();
        spec.components.runtime_protection.sensor.labels =
            BTreeMap::from([("team".to_string(), "runtime".to_string())]);
        spec.components.cluster_scanning.cluster_scanner.labels =
            BTreeMap::from([("scanner".to_string(), "yes".to_string())]);
        spec.components.cluster_scanning.cluster_scanner.prometheus.enabled = true;
        spec.components.runtime_protection.enabled = false;

        let mut object = SensorDaemonSet.empty_object();
        mutated(&spec, &mut object);
        let daemon_set = object.as_daemon_set().unwrap();
        let labels = daemon_set.metadata.labels.as_ref().unwrap();
        assert!(!labels.contains_key("team"));
        assert_eq!(labels["scanner"], "yes");
        assert_eq!(labels["app.kubernetes.io/name"], DAEMON_SET_NAME);

        let template = daemon_set.spec.as_ref().unwrap().template.metadata.as_ref().unwrap();
        assert_eq!(template.annotations.as_ref().unwrap()["prometheus.io/scrape"], "true");
        let scanner = &daemon_set.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0];
        assert_eq!(scanner.ports.as_ref().unwrap()[0].container_port, 7072);
    }

    #[test]
    fn test_sensor_is_stable() {
        let spec = sample_spec();
        let mut object = SensorDaemonSet.empty_object();
        mutated(&spec, &mut object);
        let once = object.clone();
        mutated(&spec, &mut object);
        assert_eq!(object, once);
    }
}
