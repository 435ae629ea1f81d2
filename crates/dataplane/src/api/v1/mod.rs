use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod agent;
pub mod components;
pub mod defaults;

/// Container image coordinates of a dataplane component.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Repository without registry; the registry comes from `settings.defaultImagesRegistry`
    #[serde(default)]
    pub repository: String,
    /// Falls back to the agent version when empty
    #[serde(default)]
    pub tag: String,
    #[serde(default = "default_pull_policy")]
    pub pull_policy: String,
    #[serde(default)]
    pub pull_secrets: Vec<String>,
}

fn default_pull_policy() -> String {
    "IfNotPresent".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Zero means the component's default port
    #[serde(default)]
    pub port: i32,
}

/// Tuning shared by the HTTP and file probes.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommonProbesSpec {
    #[serde(default = "default_initial_delay_seconds")]
    pub initial_delay_seconds: i32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i32,
    #[serde(default = "default_period_seconds")]
    pub period_seconds: i32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: i32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: i32,
}

fn default_initial_delay_seconds() -> i32 {
    3
}
fn default_timeout_seconds() -> i32 {
    1
}
fn default_period_seconds() -> i32 {
    30
}
fn default_success_threshold() -> i32 {
    1
}
fn default_failure_threshold() -> i32 {
    3
}

impl Default for CommonProbesSpec {
    fn default() -> Self {
        Self {
            initial_delay_seconds: default_initial_delay_seconds(),
            timeout_seconds: default_timeout_seconds(),
            period_seconds: default_period_seconds(),
            success_threshold: default_success_threshold(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpProbesSpec {
    #[serde(default = "default_http_readiness_path")]
    pub readiness_path: String,
    #[serde(default = "default_http_liveness_path")]
    pub liveness_path: String,
    #[serde(default = "default_http_probes_port")]
    pub port: i32,
    #[serde(default = "default_http_probes_scheme")]
    pub scheme: String,
    #[serde(flatten)]
    pub common: CommonProbesSpec,
}

fn default_http_readiness_path() -> String {
    "/ready".to_string()
}
fn default_http_liveness_path() -> String {
    "/alive".to_string()
}
fn default_http_probes_port() -> i32 {
    8181
}
fn default_http_probes_scheme() -> String {
    "HTTP".to_string()
}

impl Default for HttpProbesSpec {
    fn default() -> Self {
        Self {
            readiness_path: default_http_readiness_path(),
            liveness_path: default_http_liveness_path(),
            port: default_http_probes_port(),
            scheme: default_http_probes_scheme(),
            common: CommonProbesSpec::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileProbesSpec {
    #[serde(default = "default_file_readiness_path")]
    pub readiness_path: String,
    #[serde(default = "default_file_liveness_path")]
    pub liveness_path: String,
    #[serde(flatten)]
    pub common: CommonProbesSpec,
}

fn default_file_readiness_path() -> String {
    "/tmp/ready".to_string()
}
fn default_file_liveness_path() -> String {
    "/tmp/alive".to_string()
}

impl Default for FileProbesSpec {
    fn default() -> Self {
        Self {
            readiness_path: default_file_readiness_path(),
            liveness_path: default_file_liveness_path(),
            common: CommonProbesSpec::default(),
        }
    }
}

pub fn conditions_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
    let mut schema = schemars::schema::SchemaObject {
        instance_type: Some(schemars::schema::InstanceType::Array.into()),
        ..Default::default()
    };
    schema.extensions.insert("x-kubernetes-list-type".to_string(), "map".into());
    schema
        .extensions
        .insert("x-kubernetes-list-map-keys".to_string(), serde_json::json!(["type"]));
    schema.array().items = Some(schemars::schema::SingleOrVec::Single(Box::new(
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::Object.into()),
            extensions: [(
                "x-kubernetes-preserve-unknown-fields".to_string(),
                serde_json::Value::Bool(true),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        }
        .into(),
    )));
    schema.into()
}
