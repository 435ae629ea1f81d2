use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::DesiredObject;
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::Result;

use super::consts::{
    DATAPLANE_CONFIGMAP_ACCOUNT_KEY, DATAPLANE_CONFIGMAP_AGENT_VERSION_KEY, DATAPLANE_CONFIGMAP_API_ADAPTER_KEY,
    DATAPLANE_CONFIGMAP_API_HOST_KEY, DATAPLANE_CONFIGMAP_API_PORT_KEY, DATAPLANE_CONFIGMAP_API_SCHEME_KEY,
    DATAPLANE_CONFIGMAP_CLUSTER_KEY, DATAPLANE_CONFIGMAP_DATAPLANE_NAMESPACE_KEY, DATAPLANE_CONFIGMAP_NAME,
    DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_DIR_PATH, DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH,
    DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_PATH_KEY, DATAPLANE_CONFIGMAP_TLS_SKIP_VERIFY_KEY,
};

/// Identity and gateway settings every agent reads through env var references.
#[derive(Default)]
pub struct DataplaneConfigMap;

impl DesiredObject for DataplaneConfigMap {
    fn empty_object(&self) -> K8sObject {
        K8sObject::ConfigMap(ConfigMap::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, DATAPLANE_CONFIGMAP_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let config_map = object.as_config_map_mut()?;
        let api = &spec.gateways.api_gateway;
        let tls = &spec.gateways.gateway_tls;

        config_map.data = Some(BTreeMap::from(
            [
                (DATAPLANE_CONFIGMAP_ACCOUNT_KEY, spec.account.clone()),
                (DATAPLANE_CONFIGMAP_CLUSTER_KEY, spec.cluster_name.clone()),
                (DATAPLANE_CONFIGMAP_AGENT_VERSION_KEY, spec.version.clone()),
                (DATAPLANE_CONFIGMAP_DATAPLANE_NAMESPACE_KEY, spec.namespace.clone()),
                (DATAPLANE_CONFIGMAP_API_SCHEME_KEY, api.scheme.clone()),
                (DATAPLANE_CONFIGMAP_API_HOST_KEY, api.host.clone()),
                (DATAPLANE_CONFIGMAP_API_PORT_KEY, api.port.to_string()),
                (DATAPLANE_CONFIGMAP_API_ADAPTER_KEY, api.adapter.clone()),
                (DATAPLANE_CONFIGMAP_TLS_SKIP_VERIFY_KEY, tls.insecure_skip_verify.to_string()),
                (
                    DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_PATH_KEY,
                    format!("{DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_DIR_PATH}/{DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH}"),
                ),
                (DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH, tls.root_cas_bundle.clone()),
            ]
            .map(|(k, v)| (k.to_string(), v)),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_spec;

    #[test]
    fn test_configmap_data() {
        let mut spec = sample_spec();
        spec.gateways.gateway_tls.insecure_skip_verify = true;
        spec.gateways.gateway_tls.root_cas_bundle = "-----BEGIN CERTIFICATE-----".to_string();

        let mut object = DataplaneConfigMap.empty_object();
        DataplaneConfigMap.mutate(&mut object, &spec).unwrap();
        let data = object.as_config_map().unwrap().data.clone().unwrap();

        assert_eq!(data.len(), 11);
        assert_eq!(data["Account"], spec.account);
        assert_eq!(data["Cluster"], spec.cluster_name);
        assert_eq!(data["DataplaneNamespace"], "cbcontainers-dataplane");
        assert_eq!(data["ApiPort"], "443");
        assert_eq!(data["TLS.SkipVerify"], "true");
        assert_eq!(data["TLS.RootCAsPath"], "/etc/gateway-certs/root.pem");
        assert_eq!(data["root.pem"], "-----BEGIN CERTIFICATE-----");
    }

    #[test]
    fn test_configmap_follows_agent_namespace() {
        let mut spec = sample_spec();
        spec.namespace = "security".to_string();
        assert_eq!(
            DataplaneConfigMap.namespaced_name(&spec),
            ObjectKey::namespaced("security", DATAPLANE_CONFIGMAP_NAME)
        );
    }
}
