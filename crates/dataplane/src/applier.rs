//! Get, mutate, then create or update: the one primitive every component goes through.

use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info};

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::objects::{K8sObject, ObjectKey, Store};
use crate::util::errors::Result;

/// A managed object: how to name it, what an empty one looks like and how to drive an
/// existing one to the agent spec.
///
/// `mutate` edits the object in place and must be idempotent: mutating an object that was
/// already mutated with the same spec leaves it equal to itself.
pub trait DesiredObject: Send + Sync {
    fn empty_object(&self) -> K8sObject;

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey;

    fn mutate(&self, object: &mut K8sObject, spec: &CBContainersAgentSpec) -> Result<()>;
}

pub type OwnerSetter = Arc<dyn Fn(&mut ObjectMeta) -> Result<()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ApplyOptions {
    /// Leave the object alone when it already exists.
    pub create_only: bool,
    pub set_owner: Option<OwnerSetter>,
}

impl ApplyOptions {
    pub fn with_owner(set_owner: Option<OwnerSetter>) -> Self {
        ApplyOptions {
            create_only: false,
            set_owner,
        }
    }

    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }
}

/// Drives the stored object towards `desired` and reports whether the store was written.
///
/// The returned object is what the store now holds as far as this pass knows: the created
/// or updated object, or the untouched stored one.
pub async fn apply(
    store: &dyn Store,
    desired: &dyn DesiredObject,
    spec: &CBContainersAgentSpec,
    opts: &ApplyOptions,
) -> Result<(bool, K8sObject)> {
    let key = desired.namespaced_name(spec);
    let template = desired.empty_object();

    let Some(observed) = store.get(&key, &template).await? else {
        let mut object = template;
        desired.mutate(&mut object, spec)?;

        let metadata = object.metadata_mut();
        metadata.name = Some(key.name.clone());
        metadata.namespace = key.namespace.clone();
        set_owner(opts, &mut object)?;

        info!("Creating {} '{}'", object.kind(), key);
        store.create(&object).await?;
        return Ok((true, object));
    };

    if opts.create_only {
        debug!("{} '{}' exists and is create-only", observed.kind(), key);
        return Ok((false, observed));
    }

    let mut object = observed.clone();
    desired.mutate(&mut object, spec)?;
    set_owner(opts, &mut object)?;
    if object == observed {
        debug!("{} '{}' is up to date", object.kind(), key);
        return Ok((false, object));
    }

    info!("Updating {} '{}'", object.kind(), key);
    store.update(&object).await?;
    Ok((true, object))
}

/// Deletes the object behind `desired` if it is stored. Returns whether it was.
pub async fn delete_if_exists(
    store: &dyn Store,
    desired: &dyn DesiredObject,
    spec: &CBContainersAgentSpec,
) -> Result<bool> {
    let key = desired.namespaced_name(spec);
    match store.get(&key, &desired.empty_object()).await? {
        Some(object) => {
            info!("Deleting {} '{}'", object.kind(), key);
            store.delete(&object).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn set_owner(opts: &ApplyOptions, object: &mut K8sObject) -> Result<()> {
    match &opts.set_owner {
        Some(set_owner) => set_owner(object.metadata_mut()),
        None => Ok(()),
    }
}
