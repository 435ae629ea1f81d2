//! Admission webhook configurations pointing the API server at the enforcer.

use std::collections::BTreeSet;

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

use crate::adapters::webhook::{
    MATCH_POLICY_EQUIVALENT, OPERATION_ALL, SIDE_EFFECT_CLASS_NONE, SIDE_EFFECT_CLASS_NONE_ON_DRY_RUN,
};
use crate::adapters::{version_at_least, Webhook, WebhookConfiguration};
use crate::api::v1::agent::CBContainersAgentSpec;
use crate::api::v1::components::EnforcerSpec;
use crate::applier::DesiredObject;
use crate::models::TlsSecretValues;
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::{precondition_missing, Result};

use super::consts::{ENFORCER_NAME, KUBE_SYSTEM_NAMESPACE};

pub const VALIDATING_RESOURCES_WEBHOOK_NAME: &str = "resources.validating-webhook.cbcontainers";
pub const VALIDATING_NAMESPACES_WEBHOOK_NAME: &str = "namespaces.validating-webhook.cbcontainers";
pub const MUTATING_WEBHOOK_NAME: &str = "resources.mutating-webhook.cbcontainers";

const VALIDATE_PATH: &str = "/validate";
const MUTATE_PATH: &str = "/mutate";
const ADMISSION_REVIEW_VERSION: &str = "v1beta1";

/// Keeps AKS's own admission enforcer away from the configuration.
const AKS_ADMISSIONS_ENFORCER_DISABLED_LABEL: &str = "admissions.enforcer/disabled";

const VALIDATED_RESOURCES: [&str; 18] = [
    "pods/portforward",
    "pods/exec",
    "pods",
    "replicasets",
    "services",
    "roles",
    "rolebindings",
    "clusterroles",
    "clusterrolebindings",
    "networkpolicies",
    "deployments",
    "replicationcontrollers",
    "daemonsets",
    "statefulsets",
    "jobs",
    "cronjobs",
    "ingresses",
    "customresourcedefinitions",
];

const MUTATED_RESOURCES: [&str; 19] = [
    "namespaces",
    "pods",
    "replicasets",
    "services",
    "roles",
    "rolebindings",
    "clusterroles",
    "clusterrolebindings",
    "networkpolicies",
    "deployments",
    "replicationcontrollers",
    "daemonsets",
    "statefulsets",
    "jobs",
    "cronjobs",
    "ingresses",
    "customresourcedefinitions",
    "deploymentconfigs",
    "routes",
];

pub struct EnforcerValidatingWebhook {
    kubelet_version: String,
    tls_secret_values: Option<TlsSecretValues>,
}

impl EnforcerValidatingWebhook {
    pub fn new(kubelet_version: &str) -> Self {
        EnforcerValidatingWebhook {
            kubelet_version: kubelet_version.to_string(),
            tls_secret_values: None,
        }
    }

    pub fn update_tls_secret_values(&mut self, values: TlsSecretValues) {
        self.tls_secret_values = Some(values);
    }
}

impl DesiredObject for EnforcerValidatingWebhook {
    fn empty_object(&self) -> K8sObject {
        K8sObject::ValidatingWebhookConfiguration(WebhookConfiguration::empty_for_kubelet(&self.kubelet_version))
    }

    fn namespaced_name(&self, _spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::cluster_scoped(ENFORCER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let configuration = object.as_validating_webhook_mut()?;
        let tls = required_tls_values(&self.tls_secret_values)?;
        let enforcer = &spec.components.basic.enforcer;

        mutate_configuration_labels(configuration, enforcer);
        ensure_webhooks(
            configuration,
            &[VALIDATING_RESOURCES_WEBHOOK_NAME, VALIDATING_NAMESPACES_WEBHOOK_NAME],
        );

        let with_timeout = version_at_least(&self.kubelet_version, 1, 14);
        for webhook in &mut configuration.webhooks {
            webhook.admission_review_versions = vec![ADMISSION_REVIEW_VERSION.to_string()];
            webhook.failure_policy = Some(enforcer.failure_policy.clone());
            webhook.match_policy = Some(MATCH_POLICY_EQUIVALENT.to_string());
            if with_timeout {
                webhook.timeout_seconds = Some(enforcer.webhook_timeout_seconds);
            }
            webhook.set_ca_bundle(&tls.ca_cert);
            webhook.set_service(&spec.namespace, ENFORCER_NAME, VALIDATE_PATH);

            if webhook.name == VALIDATING_NAMESPACES_WEBHOOK_NAME {
                webhook.side_effects = Some(SIDE_EFFECT_CLASS_NONE.to_string());
                webhook.namespace_selector = Some(LabelSelector::default());
                mutate_rules(webhook, &["namespaces"]);
            } else {
                webhook.side_effects = Some(SIDE_EFFECT_CLASS_NONE_ON_DRY_RUN.to_string());
                mutate_namespace_selector(webhook, &[spec.namespace.as_str()]);
                mutate_rules(webhook, &VALIDATED_RESOURCES);
            }
        }
        Ok(())
    }
}

pub struct EnforcerMutatingWebhook {
    kubelet_version: String,
    tls_secret_values: Option<TlsSecretValues>,
}

impl EnforcerMutatingWebhook {
    pub fn new(kubelet_version: &str) -> Self {
        EnforcerMutatingWebhook {
            kubelet_version: kubelet_version.to_string(),
            tls_secret_values: None,
        }
    }

    pub fn update_tls_secret_values(&mut self, values: TlsSecretValues) {
        self.tls_secret_values = Some(values);
    }
}

impl DesiredObject for EnforcerMutatingWebhook {
    fn empty_object(&self) -> K8sObject {
        K8sObject::MutatingWebhookConfiguration(WebhookConfiguration::empty_for_kubelet(&self.kubelet_version))
    }

    fn namespaced_name(&self, _spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::cluster_scoped(ENFORCER_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()> {
        let configuration = object.as_mutating_webhook_mut()?;
        let tls = required_tls_values(&self.tls_secret_values)?;
        let enforcer = &spec.components.basic.enforcer;

        mutate_configuration_labels(configuration, enforcer);
        ensure_webhooks(configuration, &[MUTATING_WEBHOOK_NAME]);

        for webhook in &mut configuration.webhooks {
            webhook.failure_policy = Some(enforcer.failure_policy.clone());
            webhook.side_effects = Some(SIDE_EFFECT_CLASS_NONE_ON_DRY_RUN.to_string());
            mutate_namespace_selector(webhook, &[spec.namespace.as_str(), KUBE_SYSTEM_NAMESPACE]);
            mutate_rules(webhook, &MUTATED_RESOURCES);
            if version_at_least(&self.kubelet_version, 1, 14) {
                webhook.timeout_seconds = Some(enforcer.webhook_timeout_seconds);
                webhook.admission_review_versions = vec![ADMISSION_REVIEW_VERSION.to_string()];
            }
            if version_at_least(&self.kubelet_version, 1, 15) {
                webhook.match_policy = Some(MATCH_POLICY_EQUIVALENT.to_string());
            }
            webhook.set_ca_bundle(&tls.ca_cert);
            webhook.set_service(&spec.namespace, ENFORCER_NAME, MUTATE_PATH);
        }
        Ok(())
    }
}

fn required_tls_values(values: &Option<TlsSecretValues>) -> Result<&TlsSecretValues> {
    values
        .as_ref()
        .ok_or_else(|| precondition_missing("tls secret values weren't provided"))
}

fn mutate_configuration_labels(configuration: &mut WebhookConfiguration, enforcer: &EnforcerSpec) {
    let mut labels = enforcer.labels.clone();
    labels.insert(AKS_ADMISSIONS_ENFORCER_DISABLED_LABEL.to_string(), "true".to_string());
    configuration.metadata.labels = Some(labels);
}

/// Rebuilds the webhook list unless it holds exactly the named webhooks.
fn ensure_webhooks(configuration: &mut WebhookConfiguration, names: &[&str]) {
    let existing: BTreeSet<&str> = configuration.webhooks.iter().map(|w| w.name.as_str()).collect();
    if configuration.webhooks.len() == names.len() && names.iter().all(|name| existing.contains(name)) {
        return;
    }

    configuration.webhooks = names
        .iter()
        .map(|name| Webhook {
            name: name.to_string(),
            ..Default::default()
        })
        .collect();
}

/// Skips objects opted out with `octarine=ignore` and the given namespaces.
fn mutate_namespace_selector(webhook: &mut Webhook, excluded_namespaces: &[&str]) {
    let desired = vec![
        not_in("octarine", &["ignore"]),
        not_in("kubernetes.io/metadata.name", excluded_namespaces),
    ];

    let satisfied = webhook
        .namespace_selector
        .as_ref()
        .and_then(|selector| selector.match_expressions.as_ref())
        .is_some_and(|expressions| {
            expressions.len() == desired.len() && desired.iter().all(|d| expressions.contains(d))
        });
    if !satisfied {
        webhook.namespace_selector = Some(LabelSelector {
            match_expressions: Some(desired),
            match_labels: None,
        });
    }
}

fn not_in(key: &str, values: &[&str]) -> LabelSelectorRequirement {
    LabelSelectorRequirement {
        key: key.to_string(),
        operator: "NotIn".to_string(),
        values: Some(values.iter().map(|v| v.to_string()).collect()),
    }
}

/// One rule for every group, version and operation on `resources`. The resource list is
/// compared as a set and the rule's scope is left as stored.
fn mutate_rules(webhook: &mut Webhook, resources: &[&str]) {
    if webhook.rules.len() != 1 {
        webhook.rules = vec![RuleWithOperations::default()];
    }
    let rule = &mut webhook.rules[0];
    let all = Some(vec![OPERATION_ALL.to_string()]);
    rule.operations = all.clone();
    rule.api_versions = all.clone();
    rule.api_groups = all;

    let actual: BTreeSet<&str> = rule.resources.iter().flatten().map(String::as_str).collect();
    let same_items = rule.resources.as_ref().map_or(0, Vec::len) == resources.len()
        && resources.iter().all(|r| actual.contains(r));
    if !same_items {
        rule.resources = Some(resources.iter().map(|r| r.to_string()).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdmissionVersion;
    use crate::tests::sample_spec;
    use crate::util::errors::{Error, StdError};

    fn tls() -> TlsSecretValues {
        TlsSecretValues {
            ca_cert: b"ca-cert".to_vec(),
            ..Default::default()
        }
    }

    fn validating(kubelet_version: &str) -> EnforcerValidatingWebhook {
        let mut webhook = EnforcerValidatingWebhook::new(kubelet_version);
        webhook.update_tls_secret_values(tls());
        webhook
    }

    #[test]
    fn test_webhooks_require_tls_values() {
        let desired = EnforcerValidatingWebhook::new("v1.27.3");
        let mut object = desired.empty_object();
        let err = desired.mutate(&mut object, &sample_spec()).unwrap_err();
        assert!(matches!(err, Error::StdError(StdError::PreconditionMissing(_))));

        let desired = EnforcerMutatingWebhook::new("v1.27.3");
        let mut object = desired.empty_object();
        assert!(desired.mutate(&mut object, &sample_spec()).is_err());
    }

    #[test]
    fn test_validating_webhook_configuration() {
        let spec = sample_spec();
        let desired = validating("v1.27.3");
        let mut object = desired.empty_object();
        desired.mutate(&mut object, &spec).unwrap();

        let configuration = object.as_validating_webhook().unwrap();
        assert_eq!(configuration.version, AdmissionVersion::V1);
        assert_eq!(
            configuration.metadata.labels.as_ref().unwrap()["admissions.enforcer/disabled"],
            "true"
        );
        assert_eq!(configuration.webhooks.len(), 2);

        let resources = &configuration.webhooks[0];
        assert_eq!(resources.name, VALIDATING_RESOURCES_WEBHOOK_NAME);
        assert_eq!(resources.side_effects.as_deref(), Some("NoneOnDryRun"));
        assert_eq!(resources.timeout_seconds, Some(5));
        assert_eq!(resources.rules[0].resources.as_ref().unwrap().len(), 18);
        let expressions = resources
            .namespace_selector
            .as_ref()
            .unwrap()
            .match_expressions
            .as_ref()
            .unwrap();
        assert_eq!(
            expressions[1].values.as_deref(),
            Some(&["cbcontainers-dataplane".to_string()][..])
        );
        let service = resources.client_config.service.as_ref().unwrap();
        assert_eq!(service.name, ENFORCER_NAME);
        assert_eq!(service.path.as_deref(), Some("/validate"));
        assert_eq!(resources.client_config.ca_bundle.as_ref().unwrap().0, b"ca-cert".to_vec());

        let namespaces = &configuration.webhooks[1];
        assert_eq!(namespaces.side_effects.as_deref(), Some("None"));
        assert_eq!(namespaces.namespace_selector, Some(LabelSelector::default()));
        assert_eq!(
            namespaces.rules[0].resources.as_deref(),
            Some(&["namespaces".to_string()][..])
        );
    }

    #[test]
    fn test_validating_webhook_keeps_server_defaults() {
        let spec = sample_spec();
        let desired = validating("v1.27.3");
        let mut object = desired.empty_object();
        desired.mutate(&mut object, &spec).unwrap();

        let configuration = object.as_validating_webhook_mut().unwrap();
        for webhook in &mut configuration.webhooks {
            webhook.rules[0].scope = Some("*".to_string());
            webhook.object_selector = Some(LabelSelector::default());
            webhook.client_config.service.as_mut().unwrap().port = Some(443);
            webhook.rules[0].resources.as_mut().unwrap().reverse();
        }
        configuration.webhooks.reverse();
        let stored = object.clone();

        desired.mutate(&mut object, &spec).unwrap();
        assert_eq!(object, stored);
    }

    #[test]
    fn test_validating_webhook_resets_unknown_webhooks() {
        let desired = validating("v1.27.3");
        let mut object = desired.empty_object();
        object.as_validating_webhook_mut().unwrap().webhooks = vec![
            Webhook {
                name: "stale.cbcontainers".to_string(),
                ..Default::default()
            },
            Webhook {
                name: VALIDATING_RESOURCES_WEBHOOK_NAME.to_string(),
                ..Default::default()
            },
        ];

        desired.mutate(&mut object, &sample_spec()).unwrap();
        let names: Vec<_> = object
            .as_validating_webhook()
            .unwrap()
            .webhooks
            .iter()
            .map(|w| w.name.clone())
            .collect();
        assert_eq!(names, [VALIDATING_RESOURCES_WEBHOOK_NAME, VALIDATING_NAMESPACES_WEBHOOK_NAME]);
    }

    #[test]
    fn test_mutating_webhook_version_gates() {
        let spec = sample_spec();
        let mut old = EnforcerMutatingWebhook::new("v1.13.10");
        old.update_tls_secret_values(tls());
        let mut object = old.empty_object();
        old.mutate(&mut object, &spec).unwrap();

        let configuration = object.as_mutating_webhook().unwrap();
        assert_eq!(configuration.version, AdmissionVersion::V1Beta1);
        let webhook = &configuration.webhooks[0];
        assert_eq!(webhook.timeout_seconds, None);
        assert_eq!(webhook.match_policy, None);
        assert!(webhook.admission_review_versions.is_empty());

        let mut current = EnforcerMutatingWebhook::new("v1.15.0");
        current.update_tls_secret_values(tls());
        let mut object = current.empty_object();
        current.mutate(&mut object, &spec).unwrap();
        let webhook = &object.as_mutating_webhook().unwrap().webhooks[0];
        assert_eq!(webhook.name, MUTATING_WEBHOOK_NAME);
        assert_eq!(webhook.timeout_seconds, Some(5));
        assert_eq!(webhook.match_policy.as_deref(), Some("Equivalent"));
        assert_eq!(
            webhook.client_config.service.as_ref().unwrap().path.as_deref(),
            Some("/mutate")
        );
        let excluded = webhook.namespace_selector.as_ref().unwrap().match_expressions.as_ref().unwrap()[1]
            .values
            .clone()
            .unwrap();
        assert_eq!(excluded, ["cbcontainers-dataplane", "kube-system"]);
    }
}
