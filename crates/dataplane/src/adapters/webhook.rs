use k8s_openapi::api::admissionregistration::v1 as admission_v1;
use k8s_openapi::api::admissionregistration::v1::{RuleWithOperations, WebhookClientConfig};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::version_at_least;
use crate::util::errors::{Error, Result, StdError};

pub const FAILURE_POLICY_IGNORE: &str = "Ignore";
pub const MATCH_POLICY_EQUIVALENT: &str = "Equivalent";
pub const SIDE_EFFECT_CLASS_NONE: &str = "None";
pub const SIDE_EFFECT_CLASS_NONE_ON_DRY_RUN: &str = "NoneOnDryRun";
pub const OPERATION_ALL: &str = "*";

/// `admissionregistration.k8s.io` generations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdmissionVersion {
    #[default]
    V1,
    V1Beta1,
}

impl AdmissionVersion {
    pub fn for_kubelet(kubelet_version: &str) -> Self {
        if version_at_least(kubelet_version, 1, 16) {
            AdmissionVersion::V1
        } else {
            AdmissionVersion::V1Beta1
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            AdmissionVersion::V1 => "v1",
            AdmissionVersion::V1Beta1 => "v1beta1",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            AdmissionVersion::V1 => "admissionregistration.k8s.io/v1",
            AdmissionVersion::V1Beta1 => "admissionregistration.k8s.io/v1beta1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookKind {
    Validating,
    Mutating,
}

impl WebhookKind {
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookKind::Validating => "ValidatingWebhookConfiguration",
            WebhookKind::Mutating => "MutatingWebhookConfiguration",
        }
    }
}

/// Version independent form of a webhook configuration.
///
/// Mutation logic is written once against this struct; `to_json`/`from_json` translate
/// to and from the concrete API generation recorded in `version`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WebhookConfiguration {
    pub version: AdmissionVersion,
    pub metadata: ObjectMeta,
    pub webhooks: Vec<Webhook>,
}

/// Superset of the fields of one webhook entry across API generations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admission_review_versions: Vec<String>,
    #[serde(default)]
    pub client_config: WebhookClientConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleWithOperations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reinvocation_policy: Option<String>,
}

impl Webhook {
    pub fn set_service(&mut self, namespace: &str, name: &str, path: &str) {
        let service = self.client_config.service.get_or_insert_with(Default::default);
        service.namespace = namespace.to_string();
        service.name = name.to_string();
        service.path = Some(path.to_string());
    }

    pub fn set_ca_bundle(&mut self, ca_bundle: &[u8]) {
        self.client_config.ca_bundle = Some(k8s_openapi::ByteString(ca_bundle.to_vec()));
    }
}

impl WebhookConfiguration {
    pub fn empty_for_kubelet(kubelet_version: &str) -> Self {
        WebhookConfiguration {
            version: AdmissionVersion::for_kubelet(kubelet_version),
            ..Default::default()
        }
    }

    pub fn to_json(&self, kind: WebhookKind) -> Result<Value> {
        match self.version {
            AdmissionVersion::V1 => v1_codec::encode(self, kind),
            AdmissionVersion::V1Beta1 => v1beta1_codec::encode(self, kind),
        }
    }

    pub fn from_json(kind: WebhookKind, version: AdmissionVersion, value: Value) -> Result<Self> {
        match version {
            AdmissionVersion::V1 => v1_codec::decode(kind, value),
            AdmissionVersion::V1Beta1 => v1beta1_codec::decode(kind, value),
        }
    }
}

fn json_error(e: serde_json::Error) -> Error {
    Error::StdError(StdError::JsonSerializationError(e))
}

/// Typed codec through the `admissionregistration/v1` structs.
mod v1_codec {
    use super::*;

    pub fn encode(config: &WebhookConfiguration, kind: WebhookKind) -> Result<Value> {
        match kind {
            WebhookKind::Validating => serde_json::to_value(admission_v1::ValidatingWebhookConfiguration {
                metadata: config.metadata.clone(),
                webhooks: Some(config.webhooks.iter().map(to_validating).collect()),
            }),
            WebhookKind::Mutating => serde_json::to_value(admission_v1::MutatingWebhookConfiguration {
                metadata: config.metadata.clone(),
                webhooks: Some(config.webhooks.iter().map(to_mutating).collect()),
            }),
        }
        .map_err(json_error)
    }

    pub fn decode(kind: WebhookKind, value: Value) -> Result<WebhookConfiguration> {
        let (metadata, webhooks) = match kind {
            WebhookKind::Validating => {
                let c: admission_v1::ValidatingWebhookConfiguration =
                    serde_json::from_value(value).map_err(json_error)?;
                let webhooks = c.webhooks.unwrap_or_default().into_iter().map(from_validating).collect();
                (c.metadata, webhooks)
            }
            WebhookKind::Mutating => {
                let c: admission_v1::MutatingWebhookConfiguration =
                    serde_json::from_value(value).map_err(json_error)?;
                let webhooks = c.webhooks.unwrap_or_default().into_iter().map(from_mutating).collect();
                (c.metadata, webhooks)
            }
        };
        Ok(WebhookConfiguration {
            version: AdmissionVersion::V1,
            metadata,
            webhooks,
        })
    }

    // v1 makes sideEffects and admissionReviewVersions mandatory
    fn to_validating(w: &Webhook) -> admission_v1::ValidatingWebhook {
        admission_v1::ValidatingWebhook {
            name: w.name.clone(),
            admission_review_versions: w.admission_review_versions.clone(),
            client_config: w.client_config.clone(),
            failure_policy: w.failure_policy.clone(),
            match_policy: w.match_policy.clone(),
            namespace_selector: w.namespace_selector.clone(),
            object_selector: w.object_selector.clone(),
            rules: Some(w.rules.clone()),
            side_effects: w.side_effects.clone().unwrap_or_else(|| SIDE_EFFECT_CLASS_NONE.to_string()),
            timeout_seconds: w.timeout_seconds,
            ..Default::default()
        }
    }

    fn to_mutating(w: &Webhook) -> admission_v1::MutatingWebhook {
        admission_v1::MutatingWebhook {
            name: w.name.clone(),
            admission_review_versions: w.admission_review_versions.clone(),
            client_config: w.client_config.clone(),
            failure_policy: w.failure_policy.clone(),
            match_policy: w.match_policy.clone(),
            namespace_selector: w.namespace_selector.clone(),
            object_selector: w.object_selector.clone(),
            reinvocation_policy: w.reinvocation_policy.clone(),
            rules: Some(w.rules.clone()),
            side_effects: w.side_effects.clone().unwrap_or_else(|| SIDE_EFFECT_CLASS_NONE.to_string()),
            timeout_seconds: w.timeout_seconds,
            ..Default::default()
        }
    }

    fn from_validating(w: admission_v1::ValidatingWebhook) -> Webhook {
        Webhook {
            name: w.name,
            admission_review_versions: w.admission_review_versions,
            client_config: w.client_config,
            failure_policy: w.failure_policy,
            match_policy: w.match_policy,
            namespace_selector: w.namespace_selector,
            object_selector: w.object_selector,
            rules: w.rules.unwrap_or_default(),
            side_effects: Some(w.side_effects),
            timeout_seconds: w.timeout_seconds,
            reinvocation_policy: None,
        }
    }

    fn from_mutating(w: admission_v1::MutatingWebhook) -> Webhook {
        Webhook {
            name: w.name,
            admission_review_versions: w.admission_review_versions,
            client_config: w.client_config,
            failure_policy: w.failure_policy,
            match_policy: w.match_policy,
            namespace_selector: w.namespace_selector,
            object_selector: w.object_selector,
            rules: w.rules.unwrap_or_default(),
            side_effects: Some(w.side_effects),
            timeout_seconds: w.timeout_seconds,
            reinvocation_policy: w.reinvocation_policy,
        }
    }
}

/// Untyped codec for `admissionregistration/v1beta1`, which the generated API types no longer carry.
mod v1beta1_codec {
    use super::*;

    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Wire {
        #[serde(default)]
        metadata: ObjectMeta,
        #[serde(default)]
        webhooks: Vec<Webhook>,
    }

    pub fn encode(config: &WebhookConfiguration, kind: WebhookKind) -> Result<Value> {
        let mut value = serde_json::to_value(Wire {
            metadata: config.metadata.clone(),
            webhooks: config.webhooks.clone(),
        })
        .map_err(json_error)?;
        value["apiVersion"] = Value::String(AdmissionVersion::V1Beta1.api_version().to_string());
        value["kind"] = Value::String(kind.kind().to_string());
        Ok(value)
    }

    pub fn decode(kind: WebhookKind, value: Value) -> Result<WebhookConfiguration> {
        if let Some(actual) = value.get("kind").and_then(Value::as_str) {
            if actual != kind.kind() {
                return Err(Error::StdError(StdError::SerializationError(format!(
                    "expected {} but decoded {actual}",
                    kind.kind()
                ))));
            }
        }
        let wire: Wire = serde_json::from_value(value).map_err(json_error)?;
        let webhooks = wire
            .webhooks
            .into_iter()
            .map(|mut w| {
                if kind == WebhookKind::Validating {
                    w.reinvocation_policy = None;
                }
                w
            })
            .collect();
        Ok(WebhookConfiguration {
            version: AdmissionVersion::V1Beta1,
            metadata: wire.metadata,
            webhooks,
        })
    }
}
