use crate::adapters::VersionedPriorityClass;
use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::DesiredObject;
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::Result;

use super::consts::DATAPLANE_PRIORITY_CLASS_NAME;

const PRIORITY_CLASS_VALUE: i32 = 999999999;
const PRIORITY_CLASS_DESCRIPTION: &str = "This priority class should be used only for CBContainers pods.";

/// Cluster scoped priority class every dataplane pod runs with.
pub struct DataplanePriorityClass {
    kubelet_version: String,
}

impl DataplanePriorityClass {
    pub fn new(kubelet_version: &str) -> Self {
        DataplanePriorityClass {
            kubelet_version: kubelet_version.to_string(),
        }
    }
}

impl DesiredObject for DataplanePriorityClass {
    fn empty_object(&self) -> K8sObject {
        K8sObject::PriorityClass(VersionedPriorityClass::empty_for_kubelet(&self.kubelet_version))
    }

    fn namespaced_name(&self, _spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::cluster_scoped(DATAPLANE_PRIORITY_CLASS_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, _spec: &CBContainersAgentSpec) -> Result<()> {
        let priority_class = object.as_priority_class_mut()?;
        priority_class.set_value(PRIORITY_CLASS_VALUE);
        priority_class.set_global_default(false);
        priority_class.set_description(PRIORITY_CLASS_DESCRIPTION);
        Ok(())
    }
}
