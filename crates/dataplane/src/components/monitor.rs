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

use super::consts::{
    DATAPLANE_CONFIGMAP_AGENT_VERSION_KEY, DATAPLANE_CONFIGMAP_DATAPLANE_NAMESPACE_KEY, MONITOR_NAME,
    MONITOR_SERVICE_ACCOUNT_NAME,
};
use super::{mutate_deployment, mutate_placement, mutate_restricted_security_context, WorkloadMeta};

const MONITOR_REPLICAS: i32 = 1;
const AGENT_VERSION_VAR: &str = "MONITOR_AGENT_VERSION";
const DATAPLANE_NAMESPACE_VAR: &str = "MONITOR_DATAPLANE_NAMESPACE";

/// Reports the dataplane's health to the backend over the core events gateway.
#[derive(Default)]
pub struct MonitorDeployment;

impl DesiredObject for MonitorDeployment {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Deployment(Deployment::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, MONITOR_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let deployment = object.as_deployment_mut()?;
        let monitor = &spec.components.basic.monitor;

        let meta = WorkloadMeta {
            name: MONITOR_NAME,
            labels: &monitor.labels,
            annotations: &monitor.deployment_annotations,
            template_annotations: monitor.pod_template_annotations.clone(),
            service_account: MONITOR_SERVICE_ACCOUNT_NAME,
            image_pull_secrets: &monitor.image.pull_secrets,
        };
        let pod_spec = mutate_deployment(deployment, spec, MONITOR_REPLICAS, &meta);

        reset_volumes_unless_count(pod_spec, 1);
        mutate_volumes_to_include_root_cas(pod_spec);
        mutate_placement(pod_spec, &monitor.node_selector, monitor.affinity.as_ref());

        let container = single_container(pod_spec, MONITOR_NAME);
        mutate_resources(container, &monitor.resources);
        let env = EnvVarBuilder::new()
            .with_common_data_plane(&spec.access_token_secret_name)
            .with_events_gateway(&spec.gateways.core_events_gateway)
            .with_env_var_from_configmap(AGENT_VERSION_VAR, DATAPLANE_CONFIGMAP_AGENT_VERSION_KEY)
            .with_env_var_from_configmap(DATAPLANE_NAMESPACE_VAR, DATAPLANE_CONFIGMAP_DATAPLANE_NAMESPACE_KEY)
            .with_spec(&monitor.env);
        mutate_env_vars(container, &env);
        mutate_image(
            container,
            &monitor.image,
            &spec.version,
            spec.components.settings.default_images_registry.as_deref(),
        );
        mutate_http_probes(container, &monitor.probes);
        mutate_restricted_security_context(container);
        reset_volume_mounts_unless_count(container, 1);
        mutate_volume_mount_to_include_root_cas(container);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::consts::{APP_NAME_LABEL_KEY, DATAPLANE_PRIORITY_CLASS_NAME, REGISTRY_SECRET_NAME};
    use crate::tests::{env_value, sample_spec};

    fn mutated(spec: &CBContainersAgentSpec) -> Deployment {
        let mut object = MonitorDeployment.empty_object();
        MonitorDeployment.mutate(&mut object, spec).unwrap();
        object.as_deployment().unwrap().clone()
    }

    #[test]
    fn test_monitor_deployment() {
        let mut spec = sample_spec();
        spec.components.basic.monitor.env.insert("LOG_LEVEL".to_string(), "debug".to_string());
        let deployment = mutated(&spec);

        let deployment_spec = deployment.spec.as_ref().unwrap();
        assert_eq!(deployment_spec.replicas, Some(1));
        assert_eq!(
            deployment_spec.selector.match_labels.as_ref().unwrap()[APP_NAME_LABEL_KEY],
            MONITOR_NAME
        );

        let pod_spec = deployment_spec.template.spec.as_ref().unwrap();
        assert_eq!(pod_spec.service_account_name.as_deref(), Some("cbcontainers-monitor"));
        assert_eq!(pod_spec.priority_class_name.as_deref(), Some(DATAPLANE_PRIORITY_CLASS_NAME));
        assert_eq!(pod_spec.image_pull_secrets.as_ref().unwrap()[0].name, REGISTRY_SECRET_NAME);
        assert_eq!(pod_spec.volumes.as_ref().unwrap().len(), 1);

        let container = &pod_spec.containers[0];
        assert_eq!(container.name, MONITOR_NAME);
        assert_eq!(container.image.as_deref(), Some("cbartifactory/monitor:2.12.0"));
        let env = container.env.as_deref().unwrap();
        assert_eq!(env_value(env, "LOG_LEVEL"), Some("debug"));
        assert_eq!(env_value(env, "OCTARINE_MESSAGEPROXY_HOST"), Some("core.example.com"));
        assert!(env.iter().any(|e| e.name == "MONITOR_DATAPLANE_NAMESPACE"));

        let security = container.security_context.as_ref().unwrap();
        assert_eq!(security.run_as_user, Some(1500));
        assert_eq!(security.run_as_non_root, Some(true));
        assert_eq!(security.read_only_root_filesystem, Some(true));
    }

    #[test]
    fn test_monitor_mutation_is_stable() {
        let spec = sample_spec();
        let mut object = MonitorDeployment.empty_object();
        MonitorDeployment.mutate(&mut object, &spec).unwrap();
        let once = object.clone();
        MonitorDeployment.mutate(&mut object, &spec).unwrap();
        assert_eq!(object, once);
    }

    #[test]
    fn test_monitor_drops_extra_containers() {
        let spec = sample_spec();
        let mut deployment = mutated(&spec);
        let pod_spec = deployment.spec.as_mut().unwrap().template.spec.as_mut().unwrap();
        pod_spec.containers.push(pod_spec.containers[0].clone());

        let mut object = K8sObject::Deployment(deployment);
        MonitorDeployment.mutate(&mut object, &spec).unwrap();
        let pod_spec = object.as_deployment().unwrap().spec.clone().unwrap().template.spec.unwrap();
        assert_eq!(pod_spec.containers.len(), 1);
    }
}
