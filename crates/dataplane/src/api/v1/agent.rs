use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1::components::ComponentsSpec;
use crate::api::v1::conditions_schema;

pub static AGENT_FINALIZER: &str = "cbcontainersagent.operator.containers.carbonblack.io";

pub const DEFAULT_DATAPLANE_NAMESPACE: &str = "cbcontainers-dataplane";

/// Generate the Kubernetes wrapper struct `CBContainersAgent` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    kind = "CBContainersAgent",
    group = "operator.containers.carbonblack.io",
    version = "v1"
)]
#[kube(status = "CBContainersAgentStatus", shortname = "cbagent")]
#[serde(rename_all = "camelCase")]
pub struct CBContainersAgentSpec {
    pub account: String,
    pub cluster_name: String,
    pub version: String,
    /// Namespace every dataplane object lives in
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_access_token_secret_name")]
    pub access_token_secret_name: String,
    #[serde(default)]
    pub gateways: GatewaysSpec,
    #[serde(default)]
    pub components: ComponentsSpec,
}

fn default_namespace() -> String {
    DEFAULT_DATAPLANE_NAMESPACE.to_string()
}
fn default_access_token_secret_name() -> String {
    "cbcontainers-access-token".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewaysSpec {
    #[serde(default)]
    pub api_gateway: ApiGatewaySpec,
    #[serde(default)]
    pub core_events_gateway: EventsGatewaySpec,
    #[serde(default)]
    pub hardening_events_gateway: EventsGatewaySpec,
    #[serde(default)]
    pub runtime_events_gateway: EventsGatewaySpec,
    #[serde(default, rename = "gatewayTLS")]
    pub gateway_tls: GatewayTlsSpec,
}

/// Backend REST endpoint, used for registry secrets and written to the dataplane configmap
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewaySpec {
    #[serde(default = "default_api_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: i32,
    #[serde(default = "default_api_adapter")]
    pub adapter: String,
}

fn default_api_scheme() -> String {
    "https".to_string()
}
fn default_gateway_port() -> i32 {
    443
}
fn default_api_adapter() -> String {
    "containers".to_string()
}

impl Default for ApiGatewaySpec {
    fn default() -> Self {
        Self {
            scheme: default_api_scheme(),
            host: String::new(),
            port: default_gateway_port(),
            adapter: default_api_adapter(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventsGatewaySpec {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: i32,
}

impl Default for EventsGatewaySpec {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_gateway_port(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayTlsSpec {
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// PEM bundle trusted in addition to the system roots
    #[serde(default, rename = "rootCAsBundle")]
    pub root_cas_bundle: String,
}

/// The status object of `CBContainersAgent`
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CBContainersAgentStatus {
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default)]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
}
