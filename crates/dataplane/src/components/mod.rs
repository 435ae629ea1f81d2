//! The dataplane objects, one `DesiredObject` per managed object.
//!
//! Component objects are cheap and built per reconciliation. Those that need values from
//! outside the agent spec (registry credentials, TLS material, node count) take them through
//! `update_*` setters before being applied.

pub mod configmap;
pub mod consts;
pub mod enforcer;
pub mod image_scanning_reporter;
pub mod monitor;
pub mod priority_class;
pub mod registry_secret;
pub mod resolver;
pub mod sensor;
pub mod state_reporter;
pub mod webhooks;

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Affinity, Capabilities, Container, PodSpec, SecurityContext, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::api::v1::PrometheusSpec;
use crate::mutators::node_terms::NodeTermsBuilder;
use crate::mutators::pod::{desired_labels, mutate_annotations, mutate_image_pull_secrets, mutate_workload_labels};
use consts::{
    APP_NAME_LABEL_KEY, DATAPLANE_PRIORITY_CLASS_NAME, PROMETHEUS_PORT_ANNOTATION, PROMETHEUS_SCRAPE_ANNOTATION,
};

pub use configmap::DataplaneConfigMap;
pub use enforcer::{EnforcerDeployment, EnforcerService, EnforcerTlsSecret};
pub use image_scanning_reporter::{ImageScanningReporterDeployment, ImageScanningReporterService};
pub use monitor::MonitorDeployment;
pub use priority_class::DataplanePriorityClass;
pub use registry_secret::RegistrySecret;
pub use resolver::{ResolverDeployment, ResolverService};
pub use sensor::SensorDaemonSet;
pub use state_reporter::StateReporterDeployment;
pub use webhooks::{EnforcerMutatingWebhook, EnforcerValidatingWebhook};

const NON_ROOT_USER: i64 = 1500;

/// What every dataplane deployment carries around its containers.
pub(crate) struct WorkloadMeta<'a> {
    pub name: &'a str,
    pub labels: &'a BTreeMap<String, String>,
    pub annotations: &'a BTreeMap<String, String>,
    pub template_annotations: BTreeMap<String, String>,
    pub service_account: &'a str,
    pub image_pull_secrets: &'a [String],
}

/// Drives labels, annotations, replicas, service account, priority class and pull secrets
/// of a deployment, and hands back its pod spec for the component specific parts.
pub(crate) fn mutate_deployment<'d>(
    deployment: &'d mut Deployment,
    spec: &CBContainersAgentSpec,
    replicas: i32,
    meta: &WorkloadMeta,
) -> &'d mut PodSpec {
    let labels = desired_labels(meta.name, meta.labels);
    let deployment_spec = deployment.spec.get_or_insert_with(DeploymentSpec::default);
    deployment_spec.replicas = Some(replicas);
    mutate_workload_labels(
        &mut deployment.metadata,
        &mut deployment_spec.selector,
        &mut deployment_spec.template,
        &labels,
    );
    mutate_annotations(
        &mut deployment.metadata,
        &mut deployment_spec.template,
        meta.annotations,
        &meta.template_annotations,
    );

    let pod_spec = deployment_spec.template.spec.get_or_insert_with(PodSpec::default);
    pod_spec.service_account_name = Some(meta.service_account.to_string());
    pod_spec.priority_class_name = Some(DATAPLANE_PRIORITY_CLASS_NAME.to_string());
    mutate_image_pull_secrets(pod_spec, spec, meta.image_pull_secrets);
    pod_spec
}

/// User placement first, then the dataplane's own required node terms on top.
pub(crate) fn mutate_placement(
    pod_spec: &mut PodSpec,
    node_selector: &BTreeMap<String, String>,
    affinity: Option<&Affinity>,
) {
    pod_spec.affinity = affinity.cloned();
    pod_spec.node_selector = Some(node_selector.clone()).filter(|s| !s.is_empty());
    NodeTermsBuilder::new().build(pod_spec);
}

/// Prometheus discovery annotations overlaid with the user's template annotations.
pub(crate) fn template_annotations(
    prometheus: &PrometheusSpec,
    user: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::from([
        (PROMETHEUS_SCRAPE_ANNOTATION.to_string(), prometheus.enabled.to_string()),
        (PROMETHEUS_PORT_ANNOTATION.to_string(), prometheus.port.to_string()),
    ]);
    annotations.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));
    annotations
}

/// Non-root, read-only, no privilege escalation, every capability dropped.
pub(crate) fn mutate_restricted_security_context(container: &mut Container) {
    let context = container.security_context.get_or_insert_with(SecurityContext::default);
    context.allow_privilege_escalation = Some(false);
    context.read_only_root_filesystem = Some(true);
    context.run_as_non_root = Some(true);
    context.run_as_user = Some(NON_ROOT_USER);
    context.capabilities = Some(Capabilities {
        add: None,
        drop: Some(vec!["ALL".to_string()]),
    });
}

/// Node agents need the host: privileged, as root.
pub(crate) fn mutate_privileged_security_context(container: &mut Container) {
    let context = container.security_context.get_or_insert_with(SecurityContext::default);
    context.privileged = Some(true);
    context.run_as_user = Some(0);
}

/// Root only to bind a privileged port; everything else is dropped.
pub(crate) fn mutate_bind_service_security_context(container: &mut Container) {
    let context = container.security_context.get_or_insert_with(SecurityContext::default);
    context.allow_privilege_escalation = Some(false);
    context.read_only_root_filesystem = Some(true);
    context.run_as_user = Some(0);
    context.capabilities = Some(Capabilities {
        add: Some(vec!["NET_BIND_SERVICE".to_string()]),
        drop: Some(vec!["ALL".to_string()]),
    });
}

/// ClusterIP service with a single named port that targets the workload's port by name.
///
/// Only the fields owned here are written, so the allocated cluster IP and defaulted port
/// protocol of a stored service survive.
pub(crate) fn mutate_single_port_service(
    service: &mut Service,
    selector_name: &str,
    labels: &BTreeMap<String, String>,
    port_name: &str,
    port: i32,
    target_port_name: &str,
) {
    service.metadata.labels = Some(labels.clone()).filter(|l| !l.is_empty());
    let service_spec = service.spec.get_or_insert_with(ServiceSpec::default);
    service_spec.type_ = Some("ClusterIP".to_string());
    service_spec.selector = Some(BTreeMap::from([(
        APP_NAME_LABEL_KEY.to_string(),
        selector_name.to_string(),
    )]));

    let ports = service_spec.ports.get_or_insert_with(Vec::new);
    if ports.len() != 1 {
        *ports = vec![ServicePort::default()];
    }
    let service_port = &mut ports[0];
    service_port.name = Some(port_name.to_string());
    service_port.port = port;
    service_port.target_port = Some(IntOrString::String(target_port_name.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_keeps_server_defaults() {
        let mut service = Service::default();
        mutate_single_port_service(&mut service, "enforcer", &BTreeMap::new(), "https", 443, "https");

        let service_spec = service.spec.as_mut().unwrap();
        service_spec.cluster_ip = Some("10.0.0.12".to_string());
        service_spec.ports.as_mut().unwrap()[0].protocol = Some("TCP".to_string());
        let stored = service.clone();

        mutate_single_port_service(&mut service, "enforcer", &BTreeMap::new(), "https", 443, "https");
        assert_eq!(service, stored);
        assert!(service.metadata.labels.is_none());
    }

    #[test]
    fn test_template_annotations_user_wins() {
        let user = BTreeMap::from([("prometheus.io/port".to_string(), "9999".to_string())]);
        let prometheus = PrometheusSpec {
            enabled: false,
            port: 7071,
        };
        let annotations = template_annotations(&prometheus, &user);
        assert_eq!(annotations["prometheus.io/scrape"], "false");
        assert_eq!(annotations["prometheus.io/port"], "9999");
    }

    #[test]
    fn test_placement_keeps_user_affinity_and_adds_os_term() {
        let mut pod_spec = PodSpec::default();
        let node_selector = BTreeMap::from([("pool".to_string(), "security".to_string())]);
        mutate_placement(&mut pod_spec, &node_selector, None);

        assert_eq!(pod_spec.node_selector.as_ref(), Some(&node_selector));
        let terms = &pod_spec
            .affinity
            .as_ref()
            .unwrap()
            .node_affinity
            .as_ref()
            .unwrap()
            .required_during_scheduling_ignored_during_execution
            .as_ref()
            .unwrap()
            .node_selector_terms;
        assert_eq!(terms.len(), 1);

        mutate_placement(&mut pod_spec, &BTreeMap::new(), None);
        assert!(pod_spec.node_selector.is_none());
    }
}
