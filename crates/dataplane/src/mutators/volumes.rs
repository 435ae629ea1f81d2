use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, HostPathVolumeSource, KeyToPath, PodSpec, SecretVolumeSource,
    Volume, VolumeMount,
};

use crate::components::consts::{
    DATAPLANE_CONFIGMAP_NAME, DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_DIR_PATH,
    DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH, DEFAULT_VOLUME_MODE, ROOT_CAS_VOLUME_NAME,
};

/// Index of the volume called `name`, appending an empty one when missing.
pub fn volume_index(pod_spec: &mut PodSpec, name: &str) -> usize {
    let volumes = pod_spec.volumes.get_or_insert_with(Vec::new);
    if let Some(index) = volumes.iter().position(|v| v.name == name) {
        return index;
    }
    volumes.push(Volume {
        name: name.to_string(),
        ..Default::default()
    });
    volumes.len() - 1
}

pub fn volume_mut<'a>(pod_spec: &'a mut PodSpec, name: &str) -> &'a mut Volume {
    let index = volume_index(pod_spec, name);
    &mut pod_spec.volumes.get_or_insert_with(Vec::new)[index]
}

/// Drops every volume unless there are exactly `expected`, so stale volumes of a
/// switched-off feature go away. The named lookups then rebuild what is wanted.
pub fn reset_volumes_unless_count(pod_spec: &mut PodSpec, expected: usize) {
    if pod_spec.volumes.as_ref().map_or(0, Vec::len) != expected {
        pod_spec.volumes = None;
    }
}

pub fn reset_volume_mounts_unless_count(container: &mut Container, expected: usize) {
    if container.volume_mounts.as_ref().map_or(0, Vec::len) != expected {
        container.volume_mounts = None;
    }
}

/// Points the volume at a host path. The path type is left as stored.
pub fn mutate_host_path_volume(pod_spec: &mut PodSpec, name: &str, path: &str) {
    let volume = volume_mut(pod_spec, name);
    volume
        .host_path
        .get_or_insert_with(HostPathVolumeSource::default)
        .path = path.to_string();
}

pub fn mutate_secret_volume(pod_spec: &mut PodSpec, name: &str, secret_name: &str) {
    let volume = volume_mut(pod_spec, name);
    let secret = volume.secret.get_or_insert_with(SecretVolumeSource::default);
    secret.secret_name = Some(secret_name.to_string());
    secret.default_mode = Some(DEFAULT_VOLUME_MODE);
    secret.optional = Some(true);
}

/// The dataplane configmap's root CA bundle, mounted for gateway TLS.
pub fn mutate_volumes_to_include_root_cas(pod_spec: &mut PodSpec) {
    let volume = volume_mut(pod_spec, ROOT_CAS_VOLUME_NAME);
    let config_map = volume.config_map.get_or_insert_with(|| ConfigMapVolumeSource {
        name: DATAPLANE_CONFIGMAP_NAME.to_string(),
        default_mode: Some(DEFAULT_VOLUME_MODE),
        ..Default::default()
    });

    let items = config_map.items.get_or_insert_with(Vec::new);
    if items.len() == 1 && items[0].key == DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH {
        items[0].path = DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH.to_string();
    } else {
        *items = vec![KeyToPath {
            key: DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH.to_string(),
            path: DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH.to_string(),
            mode: None,
        }];
    }
}

/// Index of the mount called `name`, appending an empty one when missing.
pub fn volume_mount_index(container: &mut Container, name: &str) -> usize {
    let mounts = container.volume_mounts.get_or_insert_with(Vec::new);
    if let Some(index) = mounts.iter().position(|m| m.name == name) {
        return index;
    }
    mounts.push(VolumeMount {
        name: name.to_string(),
        ..Default::default()
    });
    mounts.len() - 1
}

pub fn mutate_volume_mount(container: &mut Container, name: &str, mount_path: &str, read_only: bool) {
    let index = volume_mount_index(container, name);
    let mount = &mut container.volume_mounts.get_or_insert_with(Vec::new)[index];
    mount.mount_path = mount_path.to_string();
    mount.read_only = Some(read_only);
}

pub fn mutate_volume_mount_to_include_root_cas(container: &mut Container) {
    mutate_volume_mount(
        container,
        ROOT_CAS_VOLUME_NAME,
        DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_DIR_PATH,
        true,
    );
}
