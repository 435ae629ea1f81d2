use k8s_openapi::api::scheduling::v1::PriorityClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::adapters::version_at_least;
use crate::util::errors::{Error, Result, StdError};

/// `scheduling.k8s.io` generations. The three share one field layout, so a single struct
/// carries the data and the version only decides the `apiVersion` on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulingVersion {
    V1,
    V1Beta1,
    V1Alpha1,
}

impl SchedulingVersion {
    pub fn for_kubelet(kubelet_version: &str) -> Self {
        if version_at_least(kubelet_version, 1, 14) {
            SchedulingVersion::V1
        } else if version_at_least(kubelet_version, 1, 11) {
            SchedulingVersion::V1Beta1
        } else {
            SchedulingVersion::V1Alpha1
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            SchedulingVersion::V1 => "v1",
            SchedulingVersion::V1Beta1 => "v1beta1",
            SchedulingVersion::V1Alpha1 => "v1alpha1",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            SchedulingVersion::V1 => "scheduling.k8s.io/v1",
            SchedulingVersion::V1Beta1 => "scheduling.k8s.io/v1beta1",
            SchedulingVersion::V1Alpha1 => "scheduling.k8s.io/v1alpha1",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VersionedPriorityClass {
    pub version: SchedulingVersion,
    pub priority_class: PriorityClass,
}

impl VersionedPriorityClass {
    pub fn empty_for_kubelet(kubelet_version: &str) -> Self {
        VersionedPriorityClass {
            version: SchedulingVersion::for_kubelet(kubelet_version),
            priority_class: PriorityClass::default(),
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        &self.priority_class.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.priority_class.metadata
    }

    pub fn set_value(&mut self, value: i32) {
        self.priority_class.value = value;
    }

    pub fn set_global_default(&mut self, global_default: bool) {
        self.priority_class.global_default = Some(global_default);
    }

    pub fn set_description(&mut self, description: &str) {
        self.priority_class.description = Some(description.to_string());
    }

    pub fn to_json(&self) -> Result<Value> {
        let mut value = serde_json::to_value(&self.priority_class)
            .map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))?;
        value["apiVersion"] = Value::String(self.version.api_version().to_string());
        Ok(value)
    }

    pub fn from_json(version: SchedulingVersion, mut value: Value) -> Result<Self> {
        // decoded through the v1 struct, which only accepts its own apiVersion
        value["apiVersion"] = Value::String(SchedulingVersion::V1.api_version().to_string());
        let priority_class = serde_json::from_value(value)
            .map_err(|e| Error::StdError(StdError::JsonSerializationError(e)))?;
        Ok(VersionedPriorityClass {
            version,
            priority_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduling_version_selection() {
        assert_eq!(SchedulingVersion::for_kubelet(""), SchedulingVersion::V1);
        assert_eq!(SchedulingVersion::for_kubelet("v1.14.0"), SchedulingVersion::V1);
        assert_eq!(SchedulingVersion::for_kubelet("v1.13.5"), SchedulingVersion::V1Beta1);
        assert_eq!(SchedulingVersion::for_kubelet("v1.11.0"), SchedulingVersion::V1Beta1);
        assert_eq!(SchedulingVersion::for_kubelet("v1.10.2"), SchedulingVersion::V1Alpha1);
    }

    #[test]
    fn test_legacy_priority_class_wire_shape() {
        let mut pc = VersionedPriorityClass::empty_for_kubelet("v1.12.0");
        pc.metadata_mut().name = Some("cbcontainers-dataplane-priority-class".to_string());
        pc.set_value(999999999);
        pc.set_global_default(false);

        let value = pc.to_json().unwrap();
        assert_eq!(value["apiVersion"], "scheduling.k8s.io/v1beta1");
        assert_eq!(value["kind"], "PriorityClass");
        assert_eq!(value["value"], 999999999);

        let decoded = VersionedPriorityClass::from_json(SchedulingVersion::V1Beta1, value).unwrap();
        assert_eq!(decoded, pc);
    }
}
