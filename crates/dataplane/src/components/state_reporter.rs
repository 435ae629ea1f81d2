use k8s_openapi::api::apps::v1::Deployment;

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::DesiredObject;
use crate::mutators::container::{mutate_http_probes, mutate_image, mutate_resources, single_container};
use crate::mutators::env::{mutate_env_vars, EnvVarBuilder};
use crate::mutators::volumes::{
    mutate_volume_mount_to_include_root_cas, mutate_volumes_to_include_root_cas, reset_volume_mounts_unless_count,
    reset_volumes_unless_count,
};
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::Result;

use super::consts::{STATE_REPORTER_NAME, STATE_REPORTER_SERVICE_ACCOUNT_NAME};
use super::{mutate_deployment, mutate_placement, mutate_restricted_security_context, WorkloadMeta};

#[derive(Default)]
pub struct StateReporterDeployment;

impl DesiredObject for StateReporterDeployment {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Deployment(Deployment::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, STATE_REPORTER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let deployment = object.as_deployment_mut()?;
        let reporter = &spec.components.basic.state_reporter;

        let meta = WorkloadMeta {
            name: STATE_REPORTER_NAME,
            labels: &reporter.labels,
            annotations: &reporter.deployment_annotations,
            template_annotations: reporter.pod_template_annotations.clone(),
            service_account: STATE_REPORTER_SERVICE_ACCOUNT_NAME,
            image_pull_secrets: &reporter.image.pull_secrets,
        };
        let pod_spec = mutate_deployment(deployment, spec, 1, &meta);

        reset_volumes_unless_count(pod_spec, 1);
        mutate_volumes_to_include_root_cas(pod_spec);
        mutate_placement(pod_spec, &reporter.node_selector, reporter.affinity.as_ref());

        let container = single_container(pod_spec, STATE_REPORTER_NAME);
        mutate_resources(container, &reporter.resources);
        let env = EnvVarBuilder::new()
            .with_common_data_plane(&spec.access_token_secret_name)
            .with_events_gateway(&spec.gateways.hardening_events_gateway)
            .with_spec(&reporter.env);
        mutate_env_vars(container, &env);
        mutate_image(
            container,
            &reporter.image,
            &spec.version,
            spec.components.settings.default_images_registry.as_deref(),
        );
        mutate_http_probes(container, &reporter.probes);
        mutate_restricted_security_context(container);
        reset_volume_mounts_unless_count(container, 1);
        mutate_volume_mount_to_include_root_cas(container);
        Ok(())
    }
}
