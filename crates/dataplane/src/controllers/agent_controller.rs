use crate::api::v1::agent::{CBContainersAgent, CBContainersAgentSpec, CBContainersAgentStatus, AGENT_FINALIZER};
use crate::applier::OwnerSetter;
use crate::components::consts::ACCESS_TOKEN_SECRET_KEY;
use crate::config::OperatorConfig;
use crate::gateway::ApiGateway;
use crate::objects::KubeStore;
use crate::state::{KubeClusterInfo, StateApplier};
use crate::tls::FileTlsSecretsValuesCreator;
use crate::util::status::{ready_condition, set_status_condition};
use crate::util::{errors, errors::Result, metrics, telemetry};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment},
    core::v1::{ConfigMap, Secret, Service},
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{
    api::{Api, ListParams, Patch, PatchParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        events::{Event, EventType, Recorder, Reporter},
        finalizer::{self, finalizer, Event as Finalizer},
        watcher::{self, Config},
    },
    Resource,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

pub const FIELD_MANAGER: &str = "cbcontainers-agent-controller";

/// How long to wait for the access token secret to show up.
const MISSING_ACCESS_TOKEN_REQUEUE: Duration = Duration::from_secs(30);

impl CBContainersAgent {
    // Reconcile (for non-finalizer related changes)
    async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let mut spec = self.spec.clone();
        spec.apply_defaults();

        let outcome = self.apply_dataplane(&spec, &ctx).await;
        self.patch_status(&ctx, &outcome).await?;

        let changed = outcome?;
        info!(changed, "Finished reconciling agent \"{}\"", self.name_any());
        Ok(Action::requeue(ctx.config.requeue()))
    }

    async fn apply_dataplane(&self, spec: &CBContainersAgentSpec, ctx: &Context) -> Result<bool> {
        spec.validate()?;
        ensure_single_agent(&ctx.client).await?;

        info!("Getting registry secret values");
        let access_token = read_access_token(&ctx.client, spec).await?;
        let registry_values = ApiGateway::new(spec, &access_token)?
            .get_registry_secret()
            .await?;

        info!("Applying desired state");
        let store = KubeStore::new(ctx.client.clone());
        ctx.state_applier
            .apply_desired_state(spec, registry_values, &store, Some(self.owner_setter(spec)?))
            .await
    }

    /// Owner references go on the objects in the dataplane namespace only.
    fn owner_setter(&self, spec: &CBContainersAgentSpec) -> Result<OwnerSetter> {
        let owner = self.controller_owner_ref(&()).ok_or_else(|| {
            errors::Error::StdError(errors::StdError::MetadataMissing(format!(
                "agent \"{}\" has no uid",
                self.name_any()
            )))
        })?;
        let namespace = spec.namespace.clone();
        Ok(Arc::new(move |metadata: &mut ObjectMeta| {
            if metadata.namespace.as_deref() == Some(namespace.as_str()) {
                set_controller_reference(metadata, &owner);
            }
            Ok(())
        }))
    }

    async fn patch_status(&self, ctx: &Context, outcome: &Result<bool>) -> Result<()> {
        let generation = self.metadata.generation;
        let condition = ready_condition(
            generation,
            outcome.as_ref().map(|changed| *changed).map_err(|e| e.to_string()),
        );
        let current = self.status.clone().unwrap_or_default();
        let (conditions, changed) = set_status_condition(&current.conditions, condition);
        let observed_generation = generation.unwrap_or_default();
        if !changed && current.observed_generation == observed_generation {
            return Ok(());
        }

        let agents: Api<CBContainersAgent> = Api::all(ctx.client.clone());
        let new_status = Patch::Apply(json!({
            "apiVersion": "operator.containers.carbonblack.io/v1",
            "kind": "CBContainersAgent",
            "status": CBContainersAgentStatus {
                observed_generation,
                conditions,
            }
        }));
        let ps = PatchParams::apply(FIELD_MANAGER).force();
        agents
            .patch_status(&self.name_any(), &ps, &new_status)
            .await
            .map_err(|e| errors::Error::StdError(errors::StdError::KubeError(e)))?;
        Ok(())
    }

    // Finalizer cleanup (the object was deleted, ensure nothing is orphaned)
    async fn cleanup(&self, ctx: Arc<Context>) -> Result<Action> {
        let recorder = ctx.diagnostics.read().await.recorder(ctx.client.clone());

        // namespaced objects go with their owner reference; cluster scoped ones carry none
        let mut spec = self.spec.clone();
        spec.apply_defaults();
        let store = KubeStore::new(ctx.client.clone());
        let deleted = ctx.state_applier.delete_cluster_scoped(&spec, &store).await?;
        info!(deleted, "Removed cluster scoped dataplane objects");

        recorder
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: "DeleteRequested".into(),
                    note: Some(format!("Delete `{}`", self.name_any())),
                    action: "Deleting".into(),
                    secondary: None,
                },
                &self.object_ref(&()),
            )
            .await
            .map_err(|e| errors::Error::StdError(errors::StdError::KubeError(e)))?;
        Ok(Action::await_change())
    }
}

/// Makes `owner` the controller of the object, keeping every non-controller reference.
fn set_controller_reference(metadata: &mut ObjectMeta, owner: &OwnerReference) {
    let references = metadata.owner_references.get_or_insert_with(Vec::new);
    references.retain(|r| r.uid == owner.uid || r.controller != Some(true));
    match references.iter_mut().find(|r| r.uid == owner.uid) {
        Some(existing) => *existing = owner.clone(),
        None => references.push(owner.clone()),
    }
}

/// The dataplane is a singleton; two agents would fight over the same objects.
async fn ensure_single_agent(client: &Client) -> Result<()> {
    let agents: Api<CBContainersAgent> = Api::all(client.clone());
    let list = agents
        .list_metadata(&ListParams::default())
        .await
        .map_err(|e| errors::Error::StdError(errors::StdError::KubeError(e)))?;
    if list.items.len() > 1 {
        return Err(errors::Error::StdError(errors::StdError::InvalidArgument(
            "there is more than 1 CBContainersAgent k8s object, please delete unwanted resources".to_string(),
        )));
    }
    Ok(())
}

async fn read_access_token(client: &Client, spec: &CBContainersAgentSpec) -> Result<String> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &spec.namespace);
    let secret = secrets
        .get_opt(&spec.access_token_secret_name)
        .await
        .map_err(|e| errors::Error::StdError(errors::StdError::KubeError(e)))?;
    match secret {
        Some(secret) => access_token_from_secret(&secret),
        None => {
            warn!(
                "Access token secret {}/{} does not exist yet",
                spec.namespace, spec.access_token_secret_name
            );
            Err(errors::Error::ErrorWithRequeue(errors::ErrorWithRequeue::new(
                errors::StdError::PreconditionMissing(format!(
                    "couldn't find access token secret {}/{}",
                    spec.namespace, spec.access_token_secret_name
                )),
                MISSING_ACCESS_TOKEN_REQUEUE,
            )))
        }
    }
}

fn access_token_from_secret(secret: &Secret) -> Result<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(ACCESS_TOKEN_SECRET_KEY))
        .map(|token| String::from_utf8_lossy(&token.0).into_owned())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            errors::precondition_missing(format!(
                "the k8s secret {} is missing the key {}",
                secret.name_any(),
                ACCESS_TOKEN_SECRET_KEY
            ))
        })
}

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client, config: OperatorConfig) -> Result<Arc<Context>> {
        let metrics = metrics::Metrics::new()
            .and_then(|m| m.register(&self.registry))
            .map_err(|e| {
                errors::Error::StdError(errors::StdError::InvalidArgument(format!(
                    "failed to register metrics: {e}"
                )))
            })?;
        let state_applier = StateApplier::new(
            Arc::new(KubeClusterInfo::new(client.clone())),
            Arc::new(FileTlsSecretsValuesCreator::new(config.tls_secrets_dir.clone())),
            config.kubelet_version.clone(),
            metrics.clone(),
        );
        Ok(Arc::new(Context {
            client,
            diagnostics: self.diagnostics.clone(),
            metrics,
            state_applier: Arc::new(state_applier),
            config,
        }))
    }
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: metrics::Metrics,
    pub state_applier: Arc<StateApplier>,
    pub config: OperatorConfig,
}

#[instrument(skip(ctx, agent), fields(trace_id))]
pub async fn reconcile(agent: Arc<CBContainersAgent>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    Span::current().record("trace_id", field::display(&trace_id));
    let _timer = ctx.metrics.count_and_measure("agent");
    ctx.diagnostics.write().await.last_event = Utc::now();

    // the agent is cluster scoped
    let agents: Api<CBContainersAgent> = Api::all(ctx.client.clone());

    info!("Reconciling CBContainersAgent \"{}\"", agent.name_any());
    finalizer(&agents, AGENT_FINALIZER, agent, |event| async {
        match event {
            Finalizer::Apply(agent) => agent.reconcile(ctx.clone()).await,
            Finalizer::Cleanup(agent) => agent.cleanup(ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| match e {
        finalizer::Error::ApplyFailed(err) | finalizer::Error::CleanupFailed(err) => err,
        other => errors::Error::StdError(errors::StdError::FinalizerError(Box::new(other))),
    })
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "cbcontainers-operator".into(),
        }
    }
}
impl Diagnostics {
    fn recorder(&self, client: Client) -> Recorder {
        Recorder::new(client, self.reporter.clone())
    }
}

fn error_policy(agent: Arc<CBContainersAgent>, error: &errors::Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&agent, error);
    match error {
        errors::Error::ErrorWithRequeue(e) => Action::requeue(e.duration),
        errors::Error::StdError(_) => Action::requeue(ctx.config.requeue()),
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, config: OperatorConfig) -> Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| errors::Error::StdError(errors::StdError::KubeError(e)))?;

    let agents = Api::<CBContainersAgent>::all(client.clone());
    if let Err(e) = agents.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        return Err(errors::Error::StdError(errors::StdError::KubeError(e)));
    }

    let ctx = state.to_context(client.clone(), config)?;
    Controller::new(agents, Config::default().any_semantic())
        .owns(Api::<Deployment>::all(client.clone()), watcher::Config::default())
        .owns(Api::<DaemonSet>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Service>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Secret>::all(client.clone()), watcher::Config::default())
        .owns(Api::<ConfigMap>::all(client.clone()), watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
    Ok(())
}
