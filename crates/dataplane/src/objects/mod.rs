//! The managed object kinds and the store they are read from and written to.

pub mod store;

use std::fmt;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::adapters::{VersionedPriorityClass, WebhookConfiguration, WebhookKind};
use crate::util::errors::{unexpected_kind, Error, Result, StdError};

pub use store::{KubeStore, Store};

/// Namespace and name of an object. Cluster scoped objects have no namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        ObjectKey {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster_scoped(name: &str) -> Self {
        ObjectKey {
            namespace: None,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Every kind the dataplane manages.
///
/// Kinds whose shape depends on the cluster version carry a version-independent
/// representation that remembers which API generation it was read from.
#[derive(Clone, Debug, PartialEq)]
pub enum K8sObject {
    Deployment(Deployment),
    DaemonSet(DaemonSet),
    Service(Service),
    Secret(Secret),
    ConfigMap(ConfigMap),
    PriorityClass(VersionedPriorityClass),
    ValidatingWebhookConfiguration(WebhookConfiguration),
    MutatingWebhookConfiguration(WebhookConfiguration),
}

/// Typed access to one variant, failing with the type-mismatch error for any other.
macro_rules! variant_accessors {
    ($($variant:ident: $ty:ty => $get:ident, $get_mut:ident;)*) => {
        impl K8sObject {
            $(
                pub fn $get(&self) -> Result<&$ty> {
                    match self {
                        K8sObject::$variant(o) => Ok(o),
                        other => Err(unexpected_kind(stringify!($variant), other.kind())),
                    }
                }

                pub fn $get_mut(&mut self) -> Result<&mut $ty> {
                    match self {
                        K8sObject::$variant(o) => Ok(o),
                        other => Err(unexpected_kind(stringify!($variant), other.kind())),
                    }
                }
            )*
        }
    };
}

variant_accessors! {
    Deployment: Deployment => as_deployment, as_deployment_mut;
    DaemonSet: DaemonSet => as_daemon_set, as_daemon_set_mut;
    Service: Service => as_service, as_service_mut;
    Secret: Secret => as_secret, as_secret_mut;
    ConfigMap: ConfigMap => as_config_map, as_config_map_mut;
    PriorityClass: VersionedPriorityClass => as_priority_class, as_priority_class_mut;
    ValidatingWebhookConfiguration: WebhookConfiguration => as_validating_webhook, as_validating_webhook_mut;
    MutatingWebhookConfiguration: WebhookConfiguration => as_mutating_webhook, as_mutating_webhook_mut;
}

impl K8sObject {
    pub fn kind(&self) -> &'static str {
        match self {
            K8sObject::Deployment(_) => "Deployment",
            K8sObject::DaemonSet(_) => "DaemonSet",
            K8sObject::Service(_) => "Service",
            K8sObject::Secret(_) => "Secret",
            K8sObject::ConfigMap(_) => "ConfigMap",
            K8sObject::PriorityClass(_) => "PriorityClass",
            K8sObject::ValidatingWebhookConfiguration(_) => WebhookKind::Validating.kind(),
            K8sObject::MutatingWebhookConfiguration(_) => WebhookKind::Mutating.kind(),
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            K8sObject::Deployment(_) => "deployments",
            K8sObject::DaemonSet(_) => "daemonsets",
            K8sObject::Service(_) => "services",
            K8sObject::Secret(_) => "secrets",
            K8sObject::ConfigMap(_) => "configmaps",
            K8sObject::PriorityClass(_) => "priorityclasses",
            K8sObject::ValidatingWebhookConfiguration(_) => "validatingwebhookconfigurations",
            K8sObject::MutatingWebhookConfiguration(_) => "mutatingwebhookconfigurations",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            K8sObject::Deployment(_) | K8sObject::DaemonSet(_) => "apps/v1",
            K8sObject::Service(_) | K8sObject::Secret(_) | K8sObject::ConfigMap(_) => "v1",
            K8sObject::PriorityClass(pc) => pc.version.api_version(),
            K8sObject::ValidatingWebhookConfiguration(c) | K8sObject::MutatingWebhookConfiguration(c) => {
                c.version.api_version()
            }
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            K8sObject::Deployment(o) => &o.metadata,
            K8sObject::DaemonSet(o) => &o.metadata,
            K8sObject::Service(o) => &o.metadata,
            K8sObject::Secret(o) => &o.metadata,
            K8sObject::ConfigMap(o) => &o.metadata,
            K8sObject::PriorityClass(o) => o.metadata(),
            K8sObject::ValidatingWebhookConfiguration(o) | K8sObject::MutatingWebhookConfiguration(o) => {
                &o.metadata
            }
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            K8sObject::Deployment(o) => &mut o.metadata,
            K8sObject::DaemonSet(o) => &mut o.metadata,
            K8sObject::Service(o) => &mut o.metadata,
            K8sObject::Secret(o) => &mut o.metadata,
            K8sObject::ConfigMap(o) => &mut o.metadata,
            K8sObject::PriorityClass(o) => o.metadata_mut(),
            K8sObject::ValidatingWebhookConfiguration(o) | K8sObject::MutatingWebhookConfiguration(o) => {
                &mut o.metadata
            }
        }
    }

    /// Key of the object as currently named in its metadata.
    pub fn key(&self) -> ObjectKey {
        let metadata = self.metadata();
        ObjectKey {
            namespace: metadata.namespace.clone(),
            name: metadata.name.clone().unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> Result<Value> {
        let json = |r: serde_json::Result<Value>| {
            r.map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))
        };
        match self {
            K8sObject::Deployment(o) => json(serde_json::to_value(o)),
            K8sObject::DaemonSet(o) => json(serde_json::to_value(o)),
            K8sObject::Service(o) => json(serde_json::to_value(o)),
            K8sObject::Secret(o) => json(serde_json::to_value(o)),
            K8sObject::ConfigMap(o) => json(serde_json::to_value(o)),
            K8sObject::PriorityClass(o) => o.to_json(),
            K8sObject::ValidatingWebhookConfiguration(o) => o.to_json(WebhookKind::Validating),
            K8sObject::MutatingWebhookConfiguration(o) => o.to_json(WebhookKind::Mutating),
        }
    }

    /// Decodes `value` into the same kind and API generation as `self`.
    pub fn decode_like(&self, value: Value) -> Result<K8sObject> {
        fn typed<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
            serde_json::from_value(value).map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))
        }
        Ok(match self {
            K8sObject::Deployment(_) => K8sObject::Deployment(typed(value)?),
            K8sObject::DaemonSet(_) => K8sObject::DaemonSet(typed(value)?),
            K8sObject::Service(_) => K8sObject::Service(typed(value)?),
            K8sObject::Secret(_) => K8sObject::Secret(typed(value)?),
            K8sObject::ConfigMap(_) => K8sObject::ConfigMap(typed(value)?),
            K8sObject::PriorityClass(pc) => {
                K8sObject::PriorityClass(VersionedPriorityClass::from_json(pc.version, value)?)
            }
            K8sObject::ValidatingWebhookConfiguration(c) => K8sObject::ValidatingWebhookConfiguration(
                WebhookConfiguration::from_json(WebhookKind::Validating, c.version, value)?,
            ),
            K8sObject::MutatingWebhookConfiguration(c) => K8sObject::MutatingWebhookConfiguration(
                WebhookConfiguration::from_json(WebhookKind::Mutating, c.version, value)?,
            ),
        })
    }
}
