use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::{LocalObjectReference, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::components::consts::{APP_NAME_LABEL_KEY, REGISTRY_SECRET_NAME};

/// `app.kubernetes.io/name=<name>` overlaid with the component's own labels.
pub fn desired_labels(name: &str, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut labels = extra.clone();
    labels.insert(APP_NAME_LABEL_KEY.to_string(), name.to_string());
    labels
}

/// Writes the same label set to the object, its selector and its pod template.
///
/// The three must stay identical or the workload can no longer be updated, since a
/// selector that stops matching its template is rejected.
pub fn mutate_workload_labels(
    metadata: &mut ObjectMeta,
    selector: &mut LabelSelector,
    template: &mut PodTemplateSpec,
    labels: &BTreeMap<String, String>,
) {
    metadata.labels = Some(labels.clone());
    selector.match_labels = Some(labels.clone());
    template.metadata.get_or_insert_with(ObjectMeta::default).labels = Some(labels.clone());
}

/// The registry secret when the agent creates it, the shared pull secrets, then the
/// component's own.
pub fn image_pull_secrets(spec: &CBContainersAgentSpec, additional: &[String]) -> Vec<LocalObjectReference> {
    let settings = &spec.components.settings;
    let default = settings
        .create_default_image_pull_secrets
        .then(|| REGISTRY_SECRET_NAME.to_string());

    default
        .into_iter()
        .chain(settings.image_pull_secrets.iter().cloned())
        .chain(additional.iter().cloned())
        .map(|name| LocalObjectReference { name })
        .collect()
}

/// Order-insensitive comparison by name.
pub fn objects_differ(actual: &[LocalObjectReference], desired: &[LocalObjectReference]) -> bool {
    if actual.len() != desired.len() {
        return true;
    }
    let actual: BTreeSet<&str> = actual.iter().map(|r| r.name.as_str()).collect();
    desired.iter().any(|d| !actual.contains(d.name.as_str()))
}

pub fn mutate_image_pull_secrets(pod_spec: &mut PodSpec, spec: &CBContainersAgentSpec, additional: &[String]) {
    let desired = image_pull_secrets(spec, additional);
    if objects_differ(pod_spec.image_pull_secrets.as_deref().unwrap_or_default(), &desired) {
        pod_spec.image_pull_secrets = super::non_empty(desired);
    }
}

/// Overlays `annotations` onto the object and the pod template.
pub fn mutate_annotations(
    metadata: &mut ObjectMeta,
    template: &mut PodTemplateSpec,
    object_annotations: &BTreeMap<String, String>,
    template_annotations: &BTreeMap<String, String>,
) {
    super::maps::enforce_map_contains(&mut metadata.annotations, object_annotations);
    let template_metadata = template.metadata.get_or_insert_with(ObjectMeta::default);
    super::maps::enforce_map_contains(&mut template_metadata.annotations, template_annotations);
}
