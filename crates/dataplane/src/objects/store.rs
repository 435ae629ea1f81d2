use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::{Error, Result, StdError};

/// Minimal object store the applier works against.
///
/// `get` returns `Ok(None)` for a missing object; every other failure is an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads `key` decoded into the kind and API generation of `template`.
    async fn get(&self, key: &ObjectKey, template: &K8sObject) -> Result<Option<K8sObject>>;
    async fn create(&self, object: &K8sObject) -> Result<()>;
    async fn update(&self, object: &K8sObject) -> Result<()>;
    async fn delete(&self, object: &K8sObject) -> Result<()>;
}

/// `Store` backed by the API server.
///
/// Objects travel as `DynamicObject`s so the legacy admission and scheduling generations,
/// which have no generated types, go through the same path as everything else.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }

    fn api(&self, object: &K8sObject, namespace: Option<&str>) -> Api<DynamicObject> {
        let (group, version) = object
            .api_version()
            .split_once('/')
            .unwrap_or(("", object.api_version()));
        let gvk = GroupVersionKind::gvk(group, version, object.kind());
        let resource = ApiResource::from_gvk_with_plural(&gvk, object.plural());
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

fn to_dynamic(object: &K8sObject) -> Result<DynamicObject> {
    serde_json::from_value(object.to_json()?)
        .map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))
}

fn store_error(operation: &'static str, object: &K8sObject, key: &ObjectKey, source: kube::Error) -> Error {
    Error::StdError(StdError::StoreError {
        operation,
        kind: object.kind(),
        key: key.to_string(),
        source,
    })
}

#[async_trait]
impl Store for KubeStore {
    async fn get(&self, key: &ObjectKey, template: &K8sObject) -> Result<Option<K8sObject>> {
        let api = self.api(template, key.namespace.as_deref());
        match api.get(&key.name).await {
            Ok(found) => {
                let value = serde_json::to_value(&found)
                    .map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))?;
                Ok(Some(template.decode_like(value)?))
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!("{} '{}' not found", template.kind(), key);
                Ok(None)
            }
            Err(e) => Err(store_error("get", template, key, e)),
        }
    }

    async fn create(&self, object: &K8sObject) -> Result<()> {
        let key = object.key();
        self.api(object, key.namespace.as_deref())
            .create(&PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|e| store_error("create", object, &key, e))?;
        Ok(())
    }

    async fn update(&self, object: &K8sObject) -> Result<()> {
        let key = object.key();
        // replace carries the observed resourceVersion, so a concurrent writer surfaces as a conflict
        self.api(object, key.namespace.as_deref())
            .replace(&key.name, &PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|e| store_error("update", object, &key, e))?;
        Ok(())
    }

    async fn delete(&self, object: &K8sObject) -> Result<()> {
        let key = object.key();
        self.api(object, key.namespace.as_deref())
            .delete(&key.name, &DeleteParams::default())
            .await
            .map_err(|e| store_error("delete", object, &key, e))?;
        Ok(())
    }
}
