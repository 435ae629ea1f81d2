use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::DesiredObject;
use crate::mutators::container::{
    mutate_http_probes, mutate_image, mutate_resources, mutate_single_port, single_container,
};
use crate::mutators::env::{mutate_env_vars, EnvVarBuilder};
use crate::mutators::volumes::{
    mutate_volume_mount_to_include_root_cas, mutate_volumes_to_include_root_cas, reset_volume_mounts_unless_count,
    reset_volumes_unless_count,
};
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::Result;

use super::consts::{APP_NAME_LABEL_KEY, GRPC_PORT_NAME, RESOLVER_NAME, RUNTIME_RESOLVER_SERVICE_ACCOUNT_NAME};
use super::{mutate_deployment, mutate_placement, mutate_restricted_security_context, template_annotations, WorkloadMeta};

const DEFAULT_REPLICAS: i32 = 1;
const INITIALIZATION_TIMEOUT_MINUTES: i32 = 3;
const HEADLESS_CLUSTER_IP: &str = "None";

/// Resolves runtime events to kubernetes workloads for the node sensors.
///
/// Without an explicit replica count the deployment scales with the cluster, one replica
/// per `nodesToReplicasRatio` nodes.
#[derive(Default)]
pub struct ResolverDeployment {
    nodes_count: Option<usize>,
}

impl ResolverDeployment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_nodes_count(&mut self, nodes_count: usize) {
        self.nodes_count = Some(nodes_count);
    }

    fn replicas(&self, explicit: Option<i32>, nodes_to_replicas_ratio: i32) -> i32 {
        if let Some(replicas) = explicit {
            return replicas;
        }
        match self.nodes_count {
            Some(nodes) if nodes_to_replicas_ratio > 0 => {
                let ratio = nodes_to_replicas_ratio as usize;
                i32::try_from(nodes.div_ceil(ratio)).unwrap_or(i32::MAX).max(DEFAULT_REPLICAS)
            }
            _ => DEFAULT_REPLICAS,
        }
    }
}

impl DesiredObject for ResolverDeployment {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Deployment(Deployment::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, RESOLVER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let deployment = object.as_deployment_mut()?;
        let runtime = &spec.components.runtime_protection;
        let resolver = &runtime.resolver;

        let meta = WorkloadMeta {
            name: RESOLVER_NAME,
            labels: &resolver.labels,
            annotations: &resolver.deployment_annotations,
            template_annotations: template_annotations(&resolver.prometheus, &resolver.pod_template_annotations),
            service_account: RUNTIME_RESOLVER_SERVICE_ACCOUNT_NAME,
            image_pull_secrets: &resolver.image.pull_secrets,
        };
        let replicas = self.replicas(resolver.replicas_count, resolver.nodes_to_replicas_ratio);
        let pod_spec = mutate_deployment(deployment, spec, replicas, &meta);

        reset_volumes_unless_count(pod_spec, 1);
        mutate_volumes_to_include_root_cas(pod_spec);
        mutate_placement(pod_spec, &resolver.node_selector, resolver.affinity.as_ref());

        let container = single_container(pod_spec, RESOLVER_NAME);
        mutate_resources(container, &resolver.resources);
        let env = EnvVarBuilder::new()
            .with_common_data_plane(&spec.access_token_secret_name)
            .with_events_gateway(&spec.gateways.runtime_events_gateway)
            .with_value("RUNTIME_KUBERNETES_RESOLVER_GRPC_PORT", runtime.internal_grpc_port)
            .with_value("RUNTIME_KUBERNETES_RESOLVER_LOG_LEVEL", &resolver.log_level)
            .with_value("RUNTIME_KUBERNETES_RESOLVER_PROMETHEUS_PORT", resolver.prometheus.port)
            .with_value("RUNTIME_KUBERNETES_RESOLVER_PROBES_PORT", resolver.probes.port)
            .with_value(
                "RUNTIME_KUBERNETES_RESOLVER_INITIALIZATION_TIMEOUT_MINUTES",
                INITIALIZATION_TIMEOUT_MINUTES,
            )
            .with_value("GIN_MODE", "release")
            .with_spec(&resolver.env);
        mutate_env_vars(container, &env);
        mutate_image(
            container,
            &resolver.image,
            &spec.version,
            spec.components.settings.default_images_registry.as_deref(),
        );
        mutate_http_probes(container, &resolver.probes);
        mutate_restricted_security_context(container);
        mutate_single_port(container, GRPC_PORT_NAME, runtime.internal_grpc_port);
        reset_volume_mounts_unless_count(container, 1);
        mutate_volume_mount_to_include_root_cas(container);
        Ok(())
    }
}

/// Headless service, so sensors spread their gRPC streams over every resolver pod.
#[derive(Default)]
pub struct ResolverService;

impl DesiredObject for ResolverService {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Service(Service::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, RESOLVER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let service = object.as_service_mut()?;
        let runtime = &spec.components.runtime_protection;

        service.metadata.labels = Some(runtime.resolver.labels.clone()).filter(|l| !l.is_empty());
        let service_spec = service.spec.get_or_insert_with(ServiceSpec::default);
        service_spec.type_ = Some("ClusterIP".to_string());
        service_spec.cluster_ip = Some(HEADLESS_CLUSTER_IP.to_string());
        service_spec.selector = Some(BTreeMap::from([(
            APP_NAME_LABEL_KEY.to_string(),
            RESOLVER_NAME.to_string(),
        )]));

        let ports = service_spec.ports.get_or_insert_with(Vec::new);
        if ports.len() != 1 {
            *ports = vec![ServicePort::default()];
        }
        let port = &mut ports[0];
        port.name = Some(GRPC_PORT_NAME.to_string());
        port.port = runtime.internal_grpc_port;
        port.target_port = Some(IntOrString::String(GRPC_PORT_NAME.to_string()));
        Ok(())
    }
}
