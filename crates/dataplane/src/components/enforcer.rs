use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::DesiredObject;
use crate::models::TlsSecretsValuesCreator;
use crate::mutators::container::{
    mutate_http_probes, mutate_image, mutate_resources, mutate_single_port, single_container,
};
use crate::mutators::env::{mutate_env_vars, EnvVarBuilder};
use crate::mutators::volumes::{
    mutate_secret_volume, mutate_volume_mount, mutate_volume_mount_to_include_root_cas,
    mutate_volumes_to_include_root_cas, reset_volume_mounts_unless_count, reset_volumes_unless_count,
};
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::Result;

use super::consts::{
    ENFORCER_CONTAINER_PORT, ENFORCER_NAME, ENFORCER_SERVICE_ACCOUNT_NAME, ENFORCER_TLS_NAME, HTTPS_PORT_NAME,
    HTTPS_SERVICE_PORT, TLS_SECRET_VOLUME_MOUNT_PATH, TLS_SECRET_VOLUME_NAME,
};
use super::{
    mutate_deployment, mutate_placement, mutate_restricted_security_context, mutate_single_port_service,
    template_annotations, WorkloadMeta,
};

/// Serving certificate of the enforcer and the CA the webhooks trust it with.
///
/// Applied create-only: regenerating the material on every pass would invalidate the CA
/// bundle already registered with the API server.
pub struct EnforcerTlsSecret {
    creator: Arc<dyn TlsSecretsValuesCreator>,
}

impl EnforcerTlsSecret {
    pub fn new(creator: Arc<dyn TlsSecretsValuesCreator>) -> Self {
        EnforcerTlsSecret { creator }
    }
}

impl DesiredObject for EnforcerTlsSecret {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Secret(Secret::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, ENFORCER_TLS_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let secret = object.as_secret_mut()?;
        let values = self
            .creator
            .create_tls_secrets_values(&ObjectKey::namespaced(&spec.namespace, ENFORCER_NAME))?;
        secret.data = Some(values.to_secret_data());
        Ok(())
    }
}

#[derive(Default)]
pub struct EnforcerService;

impl DesiredObject for EnforcerService {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Service(Service::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, ENFORCER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let service = object.as_service_mut()?;
        mutate_single_port_service(
            service,
            ENFORCER_NAME,
            &spec.components.basic.enforcer.labels,
            HTTPS_PORT_NAME,
            HTTPS_SERVICE_PORT,
            HTTPS_PORT_NAME,
        );
        Ok(())
    }
}

/// The admission webhook server behind both webhook configurations.
#[derive(Default)]
pub struct EnforcerDeployment;

impl DesiredObject for EnforcerDeployment {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Deployment(Deployment::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, ENFORCER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let deployment = object.as_deployment_mut()?;
        let enforcer = &spec.components.basic.enforcer;

        let meta = WorkloadMeta {
            name: ENFORCER_NAME,
            labels: &enforcer.labels,
            annotations: &enforcer.deployment_annotations,
            template_annotations: template_annotations(&enforcer.prometheus, &enforcer.pod_template_annotations),
            service_account: ENFORCER_SERVICE_ACCOUNT_NAME,
            image_pull_secrets: &enforcer.image.pull_secrets,
        };
        let pod_spec = mutate_deployment(deployment, spec, enforcer.replicas_count, &meta);

        reset_volumes_unless_count(pod_spec, 2);
        mutate_secret_volume(pod_spec, TLS_SECRET_VOLUME_NAME, ENFORCER_TLS_NAME);
        mutate_volumes_to_include_root_cas(pod_spec);
        mutate_placement(pod_spec, &enforcer.node_selector, enforcer.affinity.as_ref());

        let container = single_container(pod_spec, ENFORCER_NAME);
        mutate_resources(container, &enforcer.resources);
        let env = EnvVarBuilder::new()
            .with_common_data_plane(&spec.access_token_secret_name)
            .with_events_gateway(&spec.gateways.hardening_events_gateway)
            .with_value("GUARDRAILS_ENFORCER_KEY_FILE_PATH", format!("{TLS_SECRET_VOLUME_MOUNT_PATH}/key"))
            .with_value(
                "GUARDRAILS_ENFORCER_CERT_FILE_PATH",
                format!("{TLS_SECRET_VOLUME_MOUNT_PATH}/signed_cert"),
            )
            .with_value("GUARDRAILS_ENFORCER_PROMETHEUS_PORT", enforcer.prometheus.port)
            .with_value("GUARDRAILS_ENFORCER_PORT", ENFORCER_CONTAINER_PORT)
            .with_value("GIN_MODE", "release")
            .with_proxy_settings(&spec.components.settings.proxy)
            .with_spec(&enforcer.env);
        mutate_env_vars(container, &env);
        mutate_image(
            container,
            &enforcer.image,
            &spec.version,
            spec.components.settings.default_images_registry.as_deref(),
        );
        mutate_http_probes(container, &enforcer.probes);
        mutate_restricted_security_context(container);
        mutate_single_port(container, HTTPS_PORT_NAME, ENFORCER_CONTAINER_PORT);

        reset_volume_mounts_unless_count(container, 2);
        mutate_volume_mount(container, TLS_SECRET_VOLUME_NAME, TLS_SECRET_VOLUME_MOUNT_PATH, true);
        mutate_volume_mount_to_include_root_cas(container);
        Ok(())
    }
}
