use k8s_openapi::api::core::v1::Secret;

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::applier::DesiredObject;
use crate::models::RegistrySecretValues;
use crate::objects::{K8sObject, ObjectKey};
use crate::util::errors::{precondition_missing, Result};

use super::consts::REGISTRY_SECRET_NAME;

/// Pull credentials for the dataplane images, as handed out by the backend.
#[derive(Default)]
pub struct RegistrySecret {
    values: Option<RegistrySecretValues>,
}

impl RegistrySecret {
    pub fn update_registry_secret_values(&mut self, values: RegistrySecretValues) {
        self.values = Some(values);
    }
}

impl DesiredObject for RegistrySecret {
    fn empty_object(&self) -> K8sObject {
        K8sObject::Secret(Secret::default())
    }

    fn namespaced_name(&self, spec: &CBContainersAgentSpec) -> ObjectKey {
        ObjectKey::namespaced(&spec.namespace, REGISTRY_SECRET_NAME)
    }

    fn mutate(&self, object: &mut K8sObject, _spec: &CBContainersAgentSpec) -> Result<()> {
        let secret = object.as_secret_mut()?;
        let Some(values) = &self.values else {
            return Err(precondition_missing("wasn't given with the desired registry secret values"));
        };

        secret.type_ = Some(values.type_.clone());
        secret.data = Some(values.data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_spec;
    use crate::util::errors::{Error, StdError};
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    #[test]
    fn test_registry_secret_requires_values() {
        let secret = RegistrySecret::default();
        let mut object = secret.empty_object();
        let err = secret.mutate(&mut object, &sample_spec()).unwrap_err();
        assert!(matches!(err, Error::StdError(StdError::PreconditionMissing(_))));
    }

    #[test]
    fn test_registry_secret_type_and_data() {
        let mut secret = RegistrySecret::default();
        secret.update_registry_secret_values(RegistrySecretValues {
            type_: "kubernetes.io/dockerconfigjson".to_string(),
            data: BTreeMap::from([(".dockerconfigjson".to_string(), ByteString(b"{}".to_vec()))]),
        });

        let mut object = secret.empty_object();
        secret.mutate(&mut object, &sample_spec()).unwrap();
        let stored = object.as_secret().unwrap();
        assert_eq!(stored.type_.as_deref(), Some("kubernetes.io/dockerconfigjson"));
        assert_eq!(stored.data.as_ref().unwrap()[".dockerconfigjson"].0, b"{}".to_vec());
    }

    #[test]
    fn test_registry_secret_rejects_other_kinds() {
        let mut secret = RegistrySecret::default();
        secret.update_registry_secret_values(RegistrySecretValues::default());
        let mut object = K8sObject::ConfigMap(Default::default());
        assert!(secret.mutate(&mut object, &sample_spec()).is_err());
    }
}
