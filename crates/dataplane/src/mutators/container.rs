use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, ExecAction, HTTPGetAction, PodSpec, Probe, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::api::v1::{CommonProbesSpec, FileProbesSpec, HttpProbesSpec, ImageSpec};

/// `[registry/]repository:tag`, where an empty tag means the agent version.
pub fn full_image(image: &ImageSpec, version: &str, registry: Option<&str>) -> String {
    let tag = if image.tag.is_empty() { version } else { image.tag.as_str() };
    match registry.filter(|r| !r.is_empty()) {
        Some(registry) => format!("{}/{}:{}", registry.trim_end_matches('/'), image.repository, tag),
        None => format!("{}:{}", image.repository, tag),
    }
}

pub fn mutate_image(container: &mut Container, image: &ImageSpec, version: &str, registry: Option<&str>) {
    container.image = Some(full_image(image, version, registry));
    container.image_pull_policy = Some(image.pull_policy.clone());
}

pub fn mutate_http_probes(container: &mut Container, probes: &HttpProbesSpec) {
    let readiness = container.readiness_probe.get_or_insert_with(Probe::default);
    mutate_http_probe(readiness, &probes.readiness_path, probes);
    let liveness = container.liveness_probe.get_or_insert_with(Probe::default);
    mutate_http_probe(liveness, &probes.liveness_path, probes);
}

pub fn mutate_file_probes(container: &mut Container, probes: &FileProbesSpec) {
    let readiness = container.readiness_probe.get_or_insert_with(Probe::default);
    mutate_file_probe(readiness, &probes.readiness_path, &probes.common);
    let liveness = container.liveness_probe.get_or_insert_with(Probe::default);
    mutate_file_probe(liveness, &probes.liveness_path, &probes.common);
}

fn mutate_http_probe(probe: &mut Probe, path: &str, probes: &HttpProbesSpec) {
    if probe.http_get.is_none() {
        probe.exec = None;
        probe.grpc = None;
        probe.tcp_socket = None;
    }
    let http_get = probe.http_get.get_or_insert_with(HTTPGetAction::default);
    http_get.path = Some(path.to_string());
    http_get.port = IntOrString::Int(probes.port);
    http_get.scheme = Some(probes.scheme.clone());
    mutate_common_probe(probe, &probes.common);
}

fn mutate_file_probe(probe: &mut Probe, path: &str, common: &CommonProbesSpec) {
    if probe.exec.is_none() {
        probe.http_get = None;
        probe.grpc = None;
        probe.tcp_socket = None;
    }
    probe.exec = Some(ExecAction {
        command: Some(vec!["cat".to_string(), path.to_string()]),
    });
    mutate_common_probe(probe, common);
}

fn mutate_common_probe(probe: &mut Probe, common: &CommonProbesSpec) {
    probe.initial_delay_seconds = Some(common.initial_delay_seconds);
    probe.timeout_seconds = Some(common.timeout_seconds);
    probe.period_seconds = Some(common.period_seconds);
    probe.success_threshold = Some(common.success_threshold);
    probe.failure_threshold = Some(common.failure_threshold);
}

/// Writes the desired resources unless they are already equal by value.
///
/// The API server canonicalises quantities (`1024Mi` is read back as `1Gi`), so a string
/// comparison would report a change on every pass.
pub fn mutate_resources(container: &mut Container, desired: &ResourceRequirements) -> bool {
    let actual = container.resources.clone().unwrap_or_default();
    if resource_lists_equal(&actual.limits, &desired.limits)
        && resource_lists_equal(&actual.requests, &desired.requests)
    {
        return false;
    }

    let mut resources = actual;
    resources.limits = desired.limits.clone().filter(|l| !l.is_empty());
    resources.requests = desired.requests.clone().filter(|r| !r.is_empty());
    container.resources = Some(resources);
    true
}

fn resource_lists_equal(
    actual: &Option<BTreeMap<String, Quantity>>,
    desired: &Option<BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let actual = actual.as_ref().unwrap_or(&empty);
    let desired = desired.as_ref().unwrap_or(&empty);
    actual.len() == desired.len()
        && desired.iter().all(|(name, quantity)| {
            actual
                .get(name)
                .is_some_and(|actual| quantities_equal(actual, quantity))
        })
}

pub fn quantities_equal(a: &Quantity, b: &Quantity) -> bool {
    match (parse_quantity(&a.0), parse_quantity(&b.0)) {
        (Some(a), Some(b)) => (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()),
        _ => a.0 == b.0,
    }
}

fn parse_quantity(quantity: &str) -> Option<f64> {
    const SUFFIXES: [(&str, f64); 15] = [
        ("Ki", 1024.0),
        ("Mi", 1048576.0),
        ("Gi", 1073741824.0),
        ("Ti", 1099511627776.0),
        ("Pi", 1125899906842624.0),
        ("Ei", 1152921504606846976.0),
        ("n", 1e-9),
        ("u", 1e-6),
        ("m", 1e-3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];

    let quantity = quantity.trim();
    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * multiplier);
        }
    }
    // plain numbers and exponent forms such as 1e3
    quantity.parse::<f64>().ok()
}

/// Sets the named container port, leaving other ports alone.
pub fn mutate_port(container: &mut Container, name: &str, port: i32) {
    let ports = container.ports.get_or_insert_with(Vec::new);
    let index = match ports.iter().position(|p| p.name.as_deref() == Some(name)) {
        Some(index) => index,
        None => {
            ports.push(ContainerPort {
                name: Some(name.to_string()),
                ..Default::default()
            });
            ports.len() - 1
        }
    };
    ports[index].container_port = port;
    ports[index].protocol = Some("TCP".to_string());
}

/// Keeps exactly one port, called `name`. Host-network defaults on a matching port survive.
pub fn mutate_single_port(container: &mut Container, name: &str, port: i32) {
    let matches = container
        .ports
        .as_deref()
        .is_some_and(|ports| ports.len() == 1 && ports[0].name.as_deref() == Some(name));
    if !matches {
        container.ports = None;
    }
    mutate_port(container, name, port);
}

/// Drops every container port. Used when a component's only port is switched off.
pub fn remove_ports(container: &mut Container) {
    container.ports = None;
}

pub fn find_container_mut<'a>(pod_spec: &'a mut PodSpec, name: &str) -> Option<&'a mut Container> {
    pod_spec.containers.iter_mut().find(|c| c.name == name)
}

/// Keeps exactly one container and names it.
pub fn single_container<'a>(pod_spec: &'a mut PodSpec, name: &str) -> &'a mut Container {
    if pod_spec.containers.len() != 1 {
        pod_spec.containers = vec![Container::default()];
    }
    let container = &mut pod_spec.containers[0];
    container.name = name.to_string();
    container
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_image() {
        let image = ImageSpec {
            repository: "cbartifactory/monitor".to_string(),
            tag: String::new(),
            pull_policy: "IfNotPresent".to_string(),
            pull_secrets: vec![],
        };
        assert_eq!(full_image(&image, "2.12.0", None), "cbartifactory/monitor:2.12.0");
        assert_eq!(full_image(&image, "2.12.0", Some("")), "cbartifactory/monitor:2.12.0");
        assert_eq!(
            full_image(&image, "2.12.0", Some("registry.example.com/")),
            "registry.example.com/cbartifactory/monitor:2.12.0"
        );

        let pinned = ImageSpec {
            tag: "1.0.0-rc1".to_string(),
            ..image
        };
        assert_eq!(full_image(&pinned, "2.12.0", None), "cbartifactory/monitor:1.0.0-rc1");
    }

    #[test]
    fn test_probes_switch_action_and_keep_server_defaults() {
        let mut container = Container::default();
        mutate_http_probes(&mut container, &HttpProbesSpec::default());
        let readiness = container.readiness_probe.as_ref().unwrap();
        let http_get = readiness.http_get.as_ref().unwrap();
        assert_eq!(http_get.path.as_deref(), Some("/ready"));
        assert_eq!(http_get.port, IntOrString::Int(8181));
        assert_eq!(readiness.period_seconds, Some(30));

        container.readiness_probe.as_mut().unwrap().termination_grace_period_seconds = Some(30);
        mutate_file_probes(&mut container, &FileProbesSpec::default());
        let readiness = container.readiness_probe.as_ref().unwrap();
        assert!(readiness.http_get.is_none());
        assert_eq!(
            readiness.exec.as_ref().unwrap().command,
            Some(vec!["cat".to_string(), "/tmp/ready".to_string()])
        );
        assert_eq!(readiness.termination_grace_period_seconds, Some(30));
    }

    #[test]
    fn test_mutate_resources_compares_by_value() {
        let desired = ResourceRequirements {
            limits: Some(BTreeMap::from([
                ("memory".to_string(), Quantity("1024Mi".to_string())),
                ("cpu".to_string(), Quantity("2000m".to_string())),
            ])),
            requests: Some(BTreeMap::from([("cpu".to_string(), Quantity("30m".to_string()))])),
            ..Default::default()
        };
        let mut container = Container {
            resources: Some(ResourceRequirements {
                limits: Some(BTreeMap::from([
                    ("memory".to_string(), Quantity("1Gi".to_string())),
                    ("cpu".to_string(), Quantity("2".to_string())),
                ])),
                requests: Some(BTreeMap::from([("cpu".to_string(), Quantity("30m".to_string()))])),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(!mutate_resources(&mut container, &desired));

        container.resources.as_mut().unwrap().requests = None;
        assert!(mutate_resources(&mut container, &desired));
        assert_eq!(container.resources.as_ref().unwrap().requests, desired.requests);
    }

    #[test]
    fn test_quantities_equal_across_every_suffix() {
        let q = |s: &str| Quantity(s.to_string());
        assert!(quantities_equal(&q("1P"), &q("1000T")));
        assert!(quantities_equal(&q("2E"), &q("2000P")));
        assert!(quantities_equal(&q("1Pi"), &q("1024Ti")));
        assert!(quantities_equal(&q("1Ei"), &q("1024Pi")));
        assert!(quantities_equal(&q("500m"), &q("0.5")));
        assert!(quantities_equal(&q("1e3"), &q("1k")));
        assert!(!quantities_equal(&q("1P"), &q("1Pi")));
        assert_eq!(parse_quantity("1P"), Some(1e15));
        assert_eq!(parse_quantity("3E"), Some(3e18));
    }

    #[test]
    fn test_mutate_port_keeps_other_ports() {
        let mut container = Container {
            ports: Some(vec![ContainerPort {
                name: Some("debug".to_string()),
                container_port: 6060,
                ..Default::default()
            }]),
            ..Default::default()
        };
        mutate_port(&mut container, "metrics", 7071);
        mutate_port(&mut container, "metrics", 7071);

        let ports = container.ports.unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[1].container_port, 7071);
        assert_eq!(ports[1].protocol.as_deref(), Some("TCP"));
    }
}
