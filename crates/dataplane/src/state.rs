//! One pass over every dataplane component, in dependency order.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::{self, ApplyOptions, DesiredObject, OwnerSetter};
use crate::components::{
    DataplaneConfigMap, DataplanePriorityClass, EnforcerDeployment, EnforcerMutatingWebhook, EnforcerService,
    EnforcerTlsSecret, EnforcerValidatingWebhook, ImageScanningReporterDeployment, ImageScanningReporterService,
    MonitorDeployment, RegistrySecret, ResolverDeployment, ResolverService, SensorDaemonSet,
    StateReporterDeployment,
};
use crate::models::{RegistrySecretValues, TlsSecretValues, TlsSecretsValuesCreator};
use crate::objects::{K8sObject, Store};
use crate::util::errors::{precondition_missing, Error, Result, StdError};
use crate::util::metrics::Metrics;

/// Facts about the cluster that shape the desired objects.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterInfo: Send + Sync {
    async fn kubelet_version(&self) -> Result<String>;
    async fn nodes_count(&self) -> Result<usize>;
}

pub struct KubeClusterInfo {
    client: Client,
}

impl KubeClusterInfo {
    pub fn new(client: Client) -> Self {
        KubeClusterInfo { client }
    }
}

#[async_trait]
impl ClusterInfo for KubeClusterInfo {
    async fn kubelet_version(&self) -> Result<String> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default().limit(1))
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;
        list.items
            .first()
            .and_then(|node| node.status.as_ref())
            .and_then(|status| status.node_info.as_ref())
            .map(|info| info.kubelet_version.clone())
            .ok_or_else(|| precondition_missing("no node reports a kubelet version"))
    }

    async fn nodes_count(&self) -> Result<usize> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list_metadata(&ListParams::default())
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;
        Ok(list.items.len())
    }
}

/// Applies the whole dataplane for an agent spec and reports whether anything was written.
///
/// Partial failures are not rolled back. The next pass converges whatever was left behind,
/// except that the enforcer webhooks are pulled whenever the enforcer itself cannot be
/// trusted to answer them.
pub struct StateApplier {
    cluster: Arc<dyn ClusterInfo>,
    tls_creator: Arc<dyn TlsSecretsValuesCreator>,
    kubelet_version: OnceCell<String>,
    metrics: Metrics,
}

impl StateApplier {
    pub fn new(
        cluster: Arc<dyn ClusterInfo>,
        tls_creator: Arc<dyn TlsSecretsValuesCreator>,
        kubelet_version: Option<String>,
        metrics: Metrics,
    ) -> Self {
        StateApplier {
            cluster,
            tls_creator,
            kubelet_version: OnceCell::new_with(kubelet_version),
            metrics,
        }
    }

    /// The kubelet version is read once and then kept for the life of the process.
    async fn kubelet_version(&self) -> Result<&str> {
        let version = self
            .kubelet_version
            .get_or_try_init(|| async {
                let version = self.cluster.kubelet_version().await?;
                info!("Discovered kubelet version {}", version);
                Ok::<_, Error>(version)
            })
            .await?;
        Ok(version.as_str())
    }

    pub async fn apply_desired_state(
        &self,
        spec: &CBContainersAgentSpec,
        registry_values: RegistrySecretValues,
        store: &dyn Store,
        set_owner: Option<OwnerSetter>,
    ) -> Result<bool> {
        let kubelet_version = self.kubelet_version().await?;
        let pass = Pass {
            store,
            spec,
            opts: ApplyOptions::with_owner(set_owner),
            metrics: &self.metrics,
        };

        let core_changed = self.apply_core(&pass, registry_values, kubelet_version).await?;
        let enforcer_changed = self.apply_enforcer(&pass, kubelet_version).await?;
        info!(changed = enforcer_changed, "Applied enforcer objects");

        let (state_reporter_changed, _) = pass.apply("state-reporter", &StateReporterDeployment).await?;

        let runtime_enabled = spec.components.runtime_protection.enabled;
        let scanning_enabled = spec.components.cluster_scanning.enabled;

        let resolver_service = ResolverService;
        let mut resolver = ResolverDeployment::new();
        let resolver_changed = if runtime_enabled {
            resolver.update_nodes_count(self.cluster.nodes_count().await?);
            let (service_changed, _) = pass.apply("resolver-service", &resolver_service).await?;
            let (deployment_changed, _) = pass.apply("resolver", &resolver).await?;
            service_changed || deployment_changed
        } else {
            pass.delete_all(&[&resolver_service as &dyn DesiredObject, &resolver])
                .await?
        };
        info!(changed = resolver_changed, enabled = runtime_enabled, "Reconciled runtime resolver objects");

        let reporter_service = ImageScanningReporterService;
        let reporter = ImageScanningReporterDeployment;
        let reporter_changed = if scanning_enabled {
            let (service_changed, _) = pass.apply("image-scanning-reporter-service", &reporter_service).await?;
            let (deployment_changed, _) = pass.apply("image-scanning-reporter", &reporter).await?;
            service_changed || deployment_changed
        } else {
            pass.delete_all(&[&reporter_service as &dyn DesiredObject, &reporter])
                .await?
        };
        info!(
            changed = reporter_changed,
            enabled = scanning_enabled,
            "Reconciled image scanning reporter objects"
        );

        // one daemon set carries both the runtime sensor and the cluster scanner
        let daemon_set_changed = if runtime_enabled || scanning_enabled {
            pass.apply("node-agent", &SensorDaemonSet).await?.0
        } else {
            pass.delete_all(&[&SensorDaemonSet as &dyn DesiredObject]).await?
        };
        info!(changed = daemon_set_changed, "Reconciled node agent daemon set");

        Ok(core_changed
            || enforcer_changed
            || state_reporter_changed
            || resolver_changed
            || reporter_changed
            || daemon_set_changed)
    }

    /// Deletes what owner references cannot clean up after the agent: the webhooks and the
    /// priority class are cluster scoped.
    pub async fn delete_cluster_scoped(&self, spec: &CBContainersAgentSpec, store: &dyn Store) -> Result<bool> {
        let kubelet_version = self.kubelet_version().await?;
        let pass = Pass {
            store,
            spec,
            opts: ApplyOptions::default(),
            metrics: &self.metrics,
        };
        let validating = EnforcerValidatingWebhook::new(kubelet_version);
        let mutating = EnforcerMutatingWebhook::new(kubelet_version);
        let priority_class = DataplanePriorityClass::new(kubelet_version);
        pass.delete_all(&[&validating as &dyn DesiredObject, &mutating, &priority_class])
            .await
    }

    async fn apply_core(
        &self,
        pass: &Pass<'_>,
        registry_values: RegistrySecretValues,
        kubelet_version: &str,
    ) -> Result<bool> {
        let (configmap_changed, _) = pass.apply("configmap", &DataplaneConfigMap).await?;

        let mut registry_secret = RegistrySecret::default();
        registry_secret.update_registry_secret_values(registry_values);
        let (registry_secret_changed, _) = pass.apply("registry-secret", &registry_secret).await?;

        let (priority_class_changed, _) = pass
            .apply("priority-class", &DataplanePriorityClass::new(kubelet_version))
            .await?;
        let (monitor_changed, _) = pass.apply("monitor", &MonitorDeployment).await?;

        Ok(configmap_changed || registry_secret_changed || priority_class_changed || monitor_changed)
    }

    /// Certificate, service and deployment first; the webhooks only route admission requests
    /// to an enforcer that has at least one ready replica.
    async fn apply_enforcer(&self, pass: &Pass<'_>, kubelet_version: &str) -> Result<bool> {
        let mut validating = EnforcerValidatingWebhook::new(kubelet_version);
        let mut mutating = EnforcerMutatingWebhook::new(kubelet_version);

        let tls_secret = EnforcerTlsSecret::new(self.tls_creator.clone());
        let secret_opts = pass.opts.clone().create_only();
        let (secret_changed, secret) = match pass.apply_with("enforcer-tls", &tls_secret, &secret_opts).await {
            Ok(applied) => applied,
            Err(e) => return Err(pass.pull_webhooks_after(e, &validating, &mutating).await),
        };
        let tls_data = secret.as_secret()?.data.clone().unwrap_or_default();

        let (service_changed, _) = match pass.apply("enforcer-service", &EnforcerService).await {
            Ok(applied) => applied,
            Err(e) => return Err(pass.pull_webhooks_after(e, &validating, &mutating).await),
        };

        let (deployment_changed, deployment) = match pass.apply("enforcer", &EnforcerDeployment).await {
            Ok(applied) => applied,
            Err(e) => return Err(pass.pull_webhooks_after(e, &validating, &mutating).await),
        };

        let webhooks_changed = if ready_replicas(&deployment)? < 1 {
            let deleted = pass
                .delete_all(&[&validating as &dyn DesiredObject, &mutating])
                .await?;
            info!(deleted, "Enforcer has no ready replicas, webhooks are not registered");
            deleted
        } else {
            let values = TlsSecretValues::from_secret_data(&tls_data)?;

            validating.update_tls_secret_values(values.clone());
            let (validating_changed, _) = pass.apply("validating-webhook", &validating).await?;

            let mutating_changed = if pass.spec.components.basic.enforcer.enable_enforcement_feature {
                mutating.update_tls_secret_values(values);
                pass.apply("mutating-webhook", &mutating).await?.0
            } else {
                // the feature can be switched off after the webhook was registered
                pass.delete_all(&[&mutating as &dyn DesiredObject]).await?
            };
            validating_changed || mutating_changed
        };

        Ok(secret_changed || service_changed || deployment_changed || webhooks_changed)
    }
}

fn ready_replicas(deployment: &K8sObject) -> Result<i32> {
    Ok(deployment
        .as_deployment()?
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0))
}

/// Everything one pass shares between component applies.
struct Pass<'a> {
    store: &'a dyn Store,
    spec: &'a CBContainersAgentSpec,
    opts: ApplyOptions,
    metrics: &'a Metrics,
}

impl Pass<'_> {
    async fn apply(&self, component: &str, desired: &dyn DesiredObject) -> Result<(bool, K8sObject)> {
        self.apply_with(component, desired, &self.opts).await
    }

    async fn apply_with(
        &self,
        component: &str,
        desired: &dyn DesiredObject,
        opts: &ApplyOptions,
    ) -> Result<(bool, K8sObject)> {
        let (changed, object) = applier::apply(self.store, desired, self.spec, opts).await?;
        info!(component, changed, "Applied {}", object.kind());
        if changed {
            self.metrics.object_applied(component);
        }
        Ok((changed, object))
    }

    async fn delete_all(&self, desired: &[&dyn DesiredObject]) -> Result<bool> {
        let mut deleted_any = false;
        for object in desired {
            deleted_any |= applier::delete_if_exists(self.store, *object, self.spec).await?;
        }
        Ok(deleted_any)
    }

    /// Removes both webhooks after an enforcer object failed to apply and hands back the
    /// error to report. A failed deletion takes precedence.
    async fn pull_webhooks_after(
        &self,
        error: Error,
        validating: &EnforcerValidatingWebhook,
        mutating: &EnforcerMutatingWebhook,
    ) -> Error {
        warn!("Deleting enforcer webhooks after a failed enforcer apply: {}", error);
        match self
            .delete_all(&[validating as &dyn DesiredObject, mutating])
            .await
        {
            Ok(deleted) => {
                info!(deleted, "Deleted enforcer webhooks");
                error
            }
            Err(delete_error) => delete_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::consts::{
        DAEMON_SET_NAME, ENFORCER_NAME, ENFORCER_TLS_NAME, IMAGE_SCANNING_REPORTER_NAME, RESOLVER_NAME,
    };
    use crate::models::MockTlsSecretsValuesCreator;
    use crate::objects::ObjectKey;
    use crate::tests::{sample_spec, FakeStore};
    use k8s_openapi::api::apps::v1::DeploymentStatus;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    const VALIDATING: &str = "ValidatingWebhookConfiguration";
    const MUTATING: &str = "MutatingWebhookConfiguration";

    fn tls_values() -> TlsSecretValues {
        TlsSecretValues {
            ca_cert: b"ca".to_vec(),
            ca_key: b"ca-key".to_vec(),
            signed_cert: b"cert".to_vec(),
            key: b"key".to_vec(),
        }
    }

    fn registry_values() -> RegistrySecretValues {
        RegistrySecretValues {
            type_: "kubernetes.io/dockerconfigjson".to_string(),
            data: BTreeMap::from([(".dockerconfigjson".to_string(), ByteString(b"{}".to_vec()))]),
        }
    }

    fn state_applier(cluster: MockClusterInfo, kubelet_version: Option<&str>) -> StateApplier {
        let mut creator = MockTlsSecretsValuesCreator::new();
        creator
            .expect_create_tls_secrets_values()
            .returning(|_| Ok(tls_values()));
        StateApplier::new(
            Arc::new(cluster),
            Arc::new(creator),
            kubelet_version.map(str::to_string),
            Metrics::new().unwrap(),
        )
    }

    fn cluster_with_nodes(nodes: usize) -> MockClusterInfo {
        let mut cluster = MockClusterInfo::new();
        cluster.expect_nodes_count().returning(move || Ok(nodes));
        cluster
    }

    fn enforcer_key() -> ObjectKey {
        ObjectKey::namespaced("cbcontainers-dataplane", ENFORCER_NAME)
    }

    fn webhook_key() -> ObjectKey {
        ObjectKey::cluster_scoped(ENFORCER_NAME)
    }

    fn mark_enforcer_ready(store: &FakeStore) {
        store.modify("Deployment", &enforcer_key(), |object| {
            object.as_deployment_mut().unwrap().status = Some(DeploymentStatus {
                ready_replicas: Some(1),
                ..Default::default()
            });
        });
    }

    async fn apply(applier: &StateApplier, store: &FakeStore, spec: &CBContainersAgentSpec) -> Result<bool> {
        applier
            .apply_desired_state(spec, registry_values(), store, None)
            .await
    }

    #[tokio::test]
    async fn test_first_pass_creates_dataplane_without_webhooks() {
        let applier = state_applier(cluster_with_nodes(3), Some("v1.27.3"));
        let store = FakeStore::default();
        let spec = sample_spec();

        assert!(apply(&applier, &store, &spec).await.unwrap());

        // configmap, registry secret, priority class, monitor, enforcer tls/service/deployment,
        // state reporter, resolver pair, image scanning reporter pair and the daemon set
        assert_eq!(store.len(), 13);
        assert!(store.contains(
            "Secret",
            &ObjectKey::namespaced("cbcontainers-dataplane", ENFORCER_TLS_NAME)
        ));
        assert!(!store.contains(VALIDATING, &webhook_key()));
        assert!(!store.contains(MUTATING, &webhook_key()));
        assert_eq!(
            applier.metrics.applied_objects.with_label_values(&["configmap"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn test_converged_dataplane_reports_no_change() {
        let applier = state_applier(cluster_with_nodes(3), Some("v1.27.3"));
        let store = FakeStore::default();
        let spec = sample_spec();

        assert!(apply(&applier, &store, &spec).await.unwrap());
        assert!(!apply(&applier, &store, &spec).await.unwrap());
    }

    #[tokio::test]
    async fn test_webhooks_follow_enforcer_readiness_and_enforcement_flag() {
        let applier = state_applier(cluster_with_nodes(3), Some("v1.27.3"));
        let store = FakeStore::default();
        let mut spec = sample_spec();

        apply(&applier, &store, &spec).await.unwrap();
        mark_enforcer_ready(&store);

        assert!(apply(&applier, &store, &spec).await.unwrap());
        let validating = store.object(VALIDATING, &webhook_key()).unwrap();
        let ca_bundle = validating.as_validating_webhook().unwrap().webhooks[0]
            .client_config
            .ca_bundle
            .clone();
        assert_eq!(ca_bundle, Some(ByteString(b"ca".to_vec())));
        assert!(store.contains(MUTATING, &webhook_key()));

        spec.components.basic.enforcer.enable_enforcement_feature = false;
        assert!(apply(&applier, &store, &spec).await.unwrap());
        assert!(store.contains(VALIDATING, &webhook_key()));
        assert!(!store.contains(MUTATING, &webhook_key()));
    }

    #[tokio::test]
    async fn test_enforcer_service_failure_pulls_webhooks() {
        let applier = state_applier(cluster_with_nodes(3), Some("v1.27.3"));
        let store = FakeStore::default();
        let spec = sample_spec();

        apply(&applier, &store, &spec).await.unwrap();
        mark_enforcer_ready(&store);
        apply(&applier, &store, &spec).await.unwrap();
        assert!(store.contains(VALIDATING, &webhook_key()));

        store.fail_on("Service", enforcer_key());
        assert!(apply(&applier, &store, &spec).await.is_err());
        assert!(!store.contains(VALIDATING, &webhook_key()));
        assert!(!store.contains(MUTATING, &webhook_key()));
    }

    #[tokio::test]
    async fn test_enforcer_losing_readiness_pulls_webhooks() {
        let applier = state_applier(cluster_with_nodes(3), Some("v1.27.3"));
        let store = FakeStore::default();
        let spec = sample_spec();

        apply(&applier, &store, &spec).await.unwrap();
        mark_enforcer_ready(&store);
        apply(&applier, &store, &spec).await.unwrap();

        store.modify("Deployment", &enforcer_key(), |object| {
            object.as_deployment_mut().unwrap().status = None;
        });
        assert!(apply(&applier, &store, &spec).await.unwrap());
        assert!(!store.contains(VALIDATING, &webhook_key()));
    }

    #[tokio::test]
    async fn test_disabled_features_are_removed() {
        let applier = state_applier(cluster_with_nodes(3), Some("v1.27.3"));
        let store = FakeStore::default();
        let mut spec = sample_spec();
        let namespaced = |name| ObjectKey::namespaced("cbcontainers-dataplane", name);

        apply(&applier, &store, &spec).await.unwrap();

        spec.components.runtime_protection.enabled = false;
        assert!(apply(&applier, &store, &spec).await.unwrap());
        assert!(!store.contains("Deployment", &namespaced(RESOLVER_NAME)));
        assert!(!store.contains("Service", &namespaced(RESOLVER_NAME)));
        assert!(store.contains("DaemonSet", &namespaced(DAEMON_SET_NAME)));

        spec.components.cluster_scanning.enabled = false;
        assert!(apply(&applier, &store, &spec).await.unwrap());
        assert!(!store.contains("Deployment", &namespaced(IMAGE_SCANNING_REPORTER_NAME)));
        assert!(!store.contains("Service", &namespaced(IMAGE_SCANNING_REPORTER_NAME)));
        assert!(!store.contains("DaemonSet", &namespaced(DAEMON_SET_NAME)));
    }

    #[tokio::test]
    async fn test_resolver_replicas_come_from_node_count() {
        let applier = state_applier(cluster_with_nodes(10), Some("v1.27.3"));
        let store = FakeStore::default();

        apply(&applier, &store, &sample_spec()).await.unwrap();
        let resolver = store
            .object("Deployment", &ObjectKey::namespaced("cbcontainers-dataplane", RESOLVER_NAME))
            .unwrap();
        assert_eq!(resolver.as_deployment().unwrap().spec.as_ref().unwrap().replicas, Some(4));
    }

    #[tokio::test]
    async fn test_kubelet_version_is_discovered_once() {
        let mut cluster = cluster_with_nodes(1);
        cluster
            .expect_kubelet_version()
            .times(1)
            .returning(|| Ok("v1.15.12".to_string()));
        let applier = state_applier(cluster, None);
        let store = FakeStore::default();

        apply(&applier, &store, &sample_spec()).await.unwrap();
        apply(&applier, &store, &sample_spec()).await.unwrap();
        assert_eq!(applier.kubelet_version().await.unwrap(), "v1.15.12");
    }

    #[tokio::test]
    async fn test_kubelet_version_override_skips_discovery() {
        let mut cluster = cluster_with_nodes(1);
        cluster.expect_kubelet_version().never();
        let applier = state_applier(cluster, Some("v1.20.0"));

        assert_eq!(applier.kubelet_version().await.unwrap(), "v1.20.0");
    }

    #[tokio::test]
    async fn test_delete_cluster_scoped_objects() {
        let applier = state_applier(cluster_with_nodes(3), Some("v1.27.3"));
        let store = FakeStore::default();
        let spec = sample_spec();

        apply(&applier, &store, &spec).await.unwrap();
        mark_enforcer_ready(&store);
        apply(&applier, &store, &spec).await.unwrap();
        assert_eq!(store.len(), 15);

        assert!(applier.delete_cluster_scoped(&spec, &store).await.unwrap());
        assert!(!store.contains(VALIDATING, &webhook_key()));
        assert!(!store.contains(MUTATING, &webhook_key()));
        assert!(!store.contains(
            "PriorityClass",
            &ObjectKey::cluster_scoped("cbcontainers-dataplane-priority-class")
        ));
        assert_eq!(store.len(), 12);
        assert!(!applier.delete_cluster_scoped(&spec, &store).await.unwrap());
    }
}
