use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, Container, EnvVar, EnvVarSource, ObjectFieldSelector,
    ResourceFieldSelector, SecretKeySelector,
};

use crate::api::v1::agent::EventsGatewaySpec;
use crate::api::v1::components::ProxySettings;
use crate::components::consts::{
    ACCESS_TOKEN_SECRET_KEY, DATAPLANE_CONFIGMAP_ACCOUNT_KEY, DATAPLANE_CONFIGMAP_AGENT_VERSION_KEY,
    DATAPLANE_CONFIGMAP_API_ADAPTER_KEY, DATAPLANE_CONFIGMAP_API_HOST_KEY,
    DATAPLANE_CONFIGMAP_API_PORT_KEY, DATAPLANE_CONFIGMAP_API_SCHEME_KEY,
    DATAPLANE_CONFIGMAP_CLUSTER_KEY, DATAPLANE_CONFIGMAP_NAME, DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_PATH_KEY,
    DATAPLANE_CONFIGMAP_TLS_SKIP_VERIFY_KEY,
};

const EVENTS_GATEWAY_HOST_VAR: &str = "OCTARINE_MESSAGEPROXY_HOST";
const EVENTS_GATEWAY_PORT_VAR: &str = "OCTARINE_MESSAGEPROXY_PORT";
const ACCOUNT_VAR: &str = "OCTARINE_ACCOUNT";
const CLUSTER_VAR: &str = "OCTARINE_DOMAIN";
const ACCESS_TOKEN_VAR: &str = "OCTARINE_ACCESS_TOKEN";
const API_SCHEME_VAR: &str = "OCTARINE_API_SCHEME";
const API_HOST_VAR: &str = "OCTARINE_API_HOST";
const API_PORT_VAR: &str = "OCTARINE_API_PORT";
const API_ADAPTER_VAR: &str = "OCTARINE_API_ADAPTER_NAME";
const AGENT_VERSION_VAR: &str = "OCTARINE_AGENT_VERSION";
const TLS_SKIP_VERIFY_VAR: &str = "TLS_INSECURE_SKIP_VERIFY";
const TLS_ROOT_CAS_PATH_VAR: &str = "TLS_ROOT_CAS_PATH";
const HTTP_PROXY_VAR: &str = "HTTP_PROXY";
const HTTPS_PROXY_VAR: &str = "HTTPS_PROXY";
const NO_PROXY_VAR: &str = "NO_PROXY";

/// Collects a container's environment keyed by name. Later calls win, so builders are
/// chained from the least to the most specific source and `with_spec` goes last.
#[derive(Clone, Debug, Default)]
pub struct EnvVarBuilder {
    env_vars: BTreeMap<String, EnvVar>,
}

impl EnvVarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// User supplied values. Chain this after every built-in source.
    pub fn with_spec(mut self, desired: &BTreeMap<String, String>) -> Self {
        for (name, value) in desired {
            self.insert(plain(name, value));
        }
        self
    }

    pub fn with_events_gateway(mut self, gateway: &EventsGatewaySpec) -> Self {
        self.insert(plain(EVENTS_GATEWAY_HOST_VAR, &gateway.host));
        self.insert(plain(EVENTS_GATEWAY_PORT_VAR, &gateway.port.to_string()));
        self
    }

    pub fn with_gateway_tls(self) -> Self {
        self.with_env_var_from_configmap(TLS_SKIP_VERIFY_VAR, DATAPLANE_CONFIGMAP_TLS_SKIP_VERIFY_KEY)
            .with_env_var_from_configmap(TLS_ROOT_CAS_PATH_VAR, DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_PATH_KEY)
    }

    pub fn with_value(mut self, name: &str, value: impl ToString) -> Self {
        self.insert(plain(name, &value.to_string()));
        self
    }

    pub fn with_env_var_from_resource(mut self, name: &str, container_name: &str, resource: &str) -> Self {
        self.insert(EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                resource_field_ref: Some(ResourceFieldSelector {
                    container_name: Some(container_name.to_string()),
                    resource: resource.to_string(),
                    divisor: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    pub fn with_env_var_from_field(mut self, name: &str, field_path: &str, api_version: &str) -> Self {
        self.insert(EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: field_path.to_string(),
                    api_version: Some(api_version.to_string()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    pub fn with_env_var_from_secret(mut self, name: &str, secret_name: &str) -> Self {
        self.insert(EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret_name.to_string(),
                    key: ACCESS_TOKEN_SECRET_KEY.to_string(),
                    optional: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    pub fn with_env_var_from_configmap(mut self, name: &str, key: &str) -> Self {
        self.insert(EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                config_map_key_ref: Some(ConfigMapKeySelector {
                    name: DATAPLANE_CONFIGMAP_NAME.to_string(),
                    key: key.to_string(),
                    optional: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    /// Identity, credentials and API endpoint of the dataplane, all read from the dataplane
    /// configmap except the access token.
    pub fn with_common_data_plane(self, access_token_secret_name: &str) -> Self {
        self.with_env_var_from_secret(ACCESS_TOKEN_VAR, access_token_secret_name)
            .with_env_var_from_configmap(ACCOUNT_VAR, DATAPLANE_CONFIGMAP_ACCOUNT_KEY)
            .with_env_var_from_configmap(CLUSTER_VAR, DATAPLANE_CONFIGMAP_CLUSTER_KEY)
            .with_env_var_from_configmap(API_SCHEME_VAR, DATAPLANE_CONFIGMAP_API_SCHEME_KEY)
            .with_env_var_from_configmap(API_HOST_VAR, DATAPLANE_CONFIGMAP_API_HOST_KEY)
            .with_env_var_from_configmap(API_PORT_VAR, DATAPLANE_CONFIGMAP_API_PORT_KEY)
            .with_env_var_from_configmap(API_ADAPTER_VAR, DATAPLANE_CONFIGMAP_API_ADAPTER_KEY)
            .with_env_var_from_configmap(AGENT_VERSION_VAR, DATAPLANE_CONFIGMAP_AGENT_VERSION_KEY)
            .with_gateway_tls()
    }

    pub fn with_proxy_settings(mut self, proxy: &ProxySettings) -> Self {
        if !proxy.enabled {
            return self;
        }

        if let Some(http_proxy) = &proxy.http_proxy {
            self.insert(plain(HTTP_PROXY_VAR, http_proxy));
        }
        if let Some(https_proxy) = &proxy.https_proxy {
            self.insert(plain(HTTPS_PROXY_VAR, https_proxy));
        }
        let no_proxy: Vec<&str> = [proxy.no_proxy.as_deref(), proxy.no_proxy_suffix.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if !no_proxy.is_empty() {
            self.insert(plain(NO_PROXY_VAR, &no_proxy.join(",")));
        }
        self
    }

    /// Compares against a container's current environment as a set.
    ///
    /// Resource field references only compare container name and resource, the API server
    /// fills in the divisor.
    pub fn is_equal(&self, actual: &[EnvVar]) -> bool {
        if actual.len() != self.env_vars.len() {
            return false;
        }

        actual.iter().all(|actual_var| match self.env_vars.get(&actual_var.name) {
            None => false,
            Some(desired_var) => match resource_field_ref(desired_var) {
                Some(desired_ref) => resource_field_ref(actual_var).is_some_and(|actual_ref| {
                    actual_ref.container_name == desired_ref.container_name
                        && actual_ref.resource == desired_ref.resource
                }),
                None => actual_var == desired_var,
            },
        })
    }

    /// The environment sorted by name.
    pub fn build(&self) -> Vec<EnvVar> {
        self.env_vars.values().cloned().collect()
    }

    fn insert(&mut self, env_var: EnvVar) {
        self.env_vars.insert(env_var.name.clone(), env_var);
    }
}

fn plain(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

fn resource_field_ref(env_var: &EnvVar) -> Option<&ResourceFieldSelector> {
    env_var.value_from.as_ref()?.resource_field_ref.as_ref()
}

/// Rewrites the container environment unless it already equals the builder's as a set.
pub fn mutate_env_vars(container: &mut Container, builder: &EnvVarBuilder) -> bool {
    if builder.is_equal(container.env.as_deref().unwrap_or_default()) {
        return false;
    }

    container.env = super::non_empty(builder.build());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    fn value_of<'a>(env: &'a [EnvVar], name: &str) -> Option<&'a str> {
        env.iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    #[test]
    fn test_user_override_wins_over_gateway_vars() {
        let gateway = EventsGatewaySpec {
            host: "events.example.com".to_string(),
            port: 443,
        };
        let overrides = BTreeMap::from([(EVENTS_GATEWAY_HOST_VAR.to_string(), "mine".to_string())]);

        let env = EnvVarBuilder::new()
            .with_common_data_plane("cbcontainers-access-token")
            .with_events_gateway(&gateway)
            .with_spec(&overrides)
            .build();

        assert_eq!(value_of(&env, EVENTS_GATEWAY_HOST_VAR), Some("mine"));
        assert_eq!(value_of(&env, EVENTS_GATEWAY_PORT_VAR), Some("443"));
        let account = env.iter().find(|e| e.name == ACCOUNT_VAR).unwrap();
        assert_eq!(
            account.value_from.as_ref().unwrap().config_map_key_ref.as_ref().unwrap().key,
            DATAPLANE_CONFIGMAP_ACCOUNT_KEY
        );
    }

    #[test]
    fn test_build_is_sorted_and_order_insensitive_when_compared() {
        let builder = EnvVarBuilder::new()
            .with_value("B", 2)
            .with_value("A", 1)
            .with_spec(&BTreeMap::from([("C".to_string(), "3".to_string())]));
        let env = builder.build();
        let names: Vec<_> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);

        let mut shuffled = env.clone();
        shuffled.reverse();
        assert!(builder.is_equal(&shuffled));

        shuffled.pop();
        assert!(!builder.is_equal(&shuffled));
    }

    #[test]
    fn test_resource_field_ref_ignores_server_defaulted_divisor() {
        let builder = EnvVarBuilder::new().with_env_var_from_resource(
            "CLUSTER_SCANNER_LIMITS_MEMORY",
            "cbcontainers-cluster-scanner",
            "limits.memory",
        );
        let mut stored = builder.build();
        stored[0]
            .value_from
            .as_mut()
            .unwrap()
            .resource_field_ref
            .as_mut()
            .unwrap()
            .divisor = Some(Quantity("0".to_string()));

        assert!(builder.is_equal(&stored));
    }

    #[test]
    fn test_mutate_env_vars_only_writes_on_difference() {
        let builder = EnvVarBuilder::new().with_value("GIN_MODE", "release");
        let mut container = Container::default();

        assert!(mutate_env_vars(&mut container, &builder));
        assert!(!mutate_env_vars(&mut container, &builder));

        container.env.as_mut().unwrap()[0].value = Some("debug".to_string());
        assert!(mutate_env_vars(&mut container, &builder));
        assert_eq!(value_of(container.env.as_ref().unwrap(), "GIN_MODE"), Some("release"));
    }

    #[test]
    fn test_proxy_settings() {
        let proxy = ProxySettings {
            enabled: true,
            http_proxy: Some("http://proxy:3128".to_string()),
            https_proxy: None,
            no_proxy: Some("localhost".to_string()),
            no_proxy_suffix: Some(".svc.cluster.local".to_string()),
        };
        let env = EnvVarBuilder::new().with_proxy_settings(&proxy).build();
        assert_eq!(value_of(&env, HTTP_PROXY_VAR), Some("http://proxy:3128"));
        assert_eq!(value_of(&env, HTTPS_PROXY_VAR), None);
        assert_eq!(value_of(&env, NO_PROXY_VAR), Some("localhost,.svc.cluster.local"));

        let disabled = ProxySettings {
            enabled: false,
            ..proxy
        };
        assert!(EnvVarBuilder::new().with_proxy_settings(&disabled).build().is_empty());
    }
}
