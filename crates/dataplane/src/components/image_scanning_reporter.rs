use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::DesiredObject;
use crate::mutators::container::{mutate_image, mutate_resources, mutate_single_port, single_container};
use crate::mutators::env::{mutate_env_vars, EnvVarBuilder};
use crate::mutators::volumes::{
    mutate_secret_volume, mutate_volume_mount, mutate_volume_mount_to_include_root_cas,
    mutate_volumes_to_include_root_cas, reset_volume_mounts_unless_count, reset_volumes_unless_count,
};
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::Result;

use super::consts::{
    DATAPLANE_SERVICE_ACCOUNT_NAME, HTTPS_PORT_NAME, HTTPS_SERVICE_PORT, IMAGE_SCANNING_REPORTER_CONTAINER_PORT,
    IMAGE_SCANNING_REPORTER_NAME, IMAGE_SCANNING_REPORTER_TLS_NAME, TLS_SECRET_VOLUME_MOUNT_PATH,
    TLS_SECRET_VOLUME_NAME,
};
use super::{
    mutate_bind_service_security_context, mutate_deployment, mutate_placement, mutate_single_port_service,
    template_annotations, WorkloadMeta,
};

/// Receives cluster scanner results over https and forwards them to the hardening gateway.
///
/// The serving certificate comes from an optional secret that nothing here creates; the
/// reporter falls back to the gateway TLS settings when it is absent.
#[derive(Default)]
pub struct ImageScanningReporterDeployment;

impl DesiredObject for ImageScanningReporterDeployment {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Deployment(Deployment::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, IMAGE_SCANNING_REPORTER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let deployment = object.as_deployment_mut()?;
        let reporter = &spec.components.cluster_scanning.image_scanning_reporter;

        let meta = WorkloadMeta {
            name: IMAGE_SCANNING_REPORTER_NAME,
            labels: &reporter.labels,
            annotations: &reporter.deployment_annotations,
            template_annotations: template_annotations(&reporter.prometheus, &reporter.pod_template_annotations),
            service_account: DATAPLANE_SERVICE_ACCOUNT_NAME,
            image_pull_secrets: &reporter.image.pull_secrets,
        };
        let pod_spec = mutate_deployment(deployment, spec, reporter.replicas_count, &meta);

        reset_volumes_unless_count(pod_spec, 2);
        mutate_secret_volume(pod_spec, TLS_SECRET_VOLUME_NAME, IMAGE_SCANNING_REPORTER_TLS_NAME);
        mutate_volumes_to_include_root_cas(pod_spec);
        mutate_placement(pod_spec, &reporter.node_selector, reporter.affinity.as_ref());

        let container = single_container(pod_spec, IMAGE_SCANNING_REPORTER_NAME);
        mutate_resources(container, &reporter.resources);
        let env = EnvVarBuilder::new()
            .with_common_data_plane(&spec.access_token_secret_name)
            .with_events_gateway(&spec.gateways.hardening_events_gateway)
            .with_value("IMAGE_SCANNING_REPORTER_PROMETHEUS_PORT", reporter.prometheus.port)
            .with_value("GIN_MODE", "release")
            .with_gateway_tls()
            .with_spec(&reporter.env);
        mutate_env_vars(container, &env);
        mutate_image(
            container,
            &reporter.image,
            &spec.version,
            spec.components.settings.default_images_registry.as_deref(),
        );
        mutate_bind_service_security_context(container);
        mutate_single_port(container, HTTPS_PORT_NAME, IMAGE_SCANNING_REPORTER_CONTAINER_PORT);

        reset_volume_mounts_unless_count(container, 2);
        mutate_volume_mount(container, TLS_SECRET_VOLUME_NAME, TLS_SECRET_VOLUME_MOUNT_PATH, true);
        mutate_volume_mount_to_include_root_cas(container);
        Ok(())
    }
}

#[derive(Default)]
pub struct ImageScanningReporterService;

impl DesiredObject for ImageScanningReporterService {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Service(Service::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, IMAGE_SCANNING_REPORTER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let service = object.as_service_mut()?;
        mutate_single_port_service(
            service,
            IMAGE_SCANNING_REPORTER_NAME,
            &spec.components.cluster_scanning.image_scanning_reporter.labels,
            HTTPS_PORT_NAME,
            HTTPS_SERVICE_PORT,
            HTTPS_PORT_NAME,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{env_value, sample_spec};

    #[test]
    fn test_image_scanning_reporter_deployment() {
        let spec = sample_spec();
        let mut object = ImageScanningReporterDeployment.empty_object();
        ImageScanningReporterDeployment.mutate(&mut object, &spec).unwrap();

        let pod_spec = object.as_deployment().unwrap().spec.clone().unwrap().template.spec.unwrap();
        assert_eq!(pod_spec.service_account_name.as_deref(), Some("cbcontainers-operator"));
        let cert = pod_spec.volumes.as_ref().unwrap().iter().find(|v| v.name == "cert").unwrap();
        assert_eq!(
            cert.secret.as_ref().unwrap().secret_name.as_deref(),
            Some(IMAGE_SCANNING_REPORTER_TLS_NAME)
        );
        assert_eq!(cert.secret.as_ref().unwrap().optional, Some(true));

        let container = &pod_spec.containers[0];
        assert!(container.readiness_probe.is_none());
        let context = container.security_context.as_ref().unwrap();
        assert_eq!(context.run_as_user, Some(0));
        assert_eq!(
            context.capabilities.as_ref().unwrap().add.as_deref(),
            Some(&["NET_BIND_SERVICE".to_string()][..])
        );
        let env = container.env.as_deref().unwrap();
        assert_eq!(env_value(env, "GIN_MODE"), Some("release"));
        assert_eq!(env_value(env, "OCTARINE_MESSAGEPROXY_HOST"), Some("hardening.example.com"));
        assert!(env.iter().any(|e| e.name == "TLS_ROOT_CAS_PATH"));
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 443);
    }

    #[test]
    fn test_image_scanning_reporter_is_stable() {
        let spec = sample_spec();
        let mut object = ImageScanningReporterDeployment.empty_object();
        ImageScanningReporterDeployment.mutate(&mut object, &spec).unwrap();
        let once = object.clone();
        ImageScanningReporterDeployment.mutate(&mut object, &spec).unwrap();
        assert_eq!(object, once);
    }

    #[test]
    fn test_image_scanning_reporter_service() {
        let mut object = ImageScanningReporterService.empty_object();
        ImageScanningReporterService.mutate(&mut object, &sample_spec()).unwrap();
        let service = object.as_service().unwrap();
        let selector = service.spec.as_ref().unwrap().selector.clone().unwrap();
        assert_eq!(selector["app.kubernetes.io/name"], IMAGE_SCANNING_REPORTER_NAME);
    }
}
