use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use serde::{Deserialize, Serialize};

use crate::objects::ObjectKey;
use crate::util::errors::{precondition_missing, Result};

pub const TLS_CA_CERT_KEY: &str = "ca.crt";
pub const TLS_CA_KEY_KEY: &str = "ca.key";
pub const TLS_SIGNED_CERT_KEY: &str = "signed_cert";
pub const TLS_KEY_KEY: &str = "key";

/// Certificate material backing the enforcer's TLS secret and the webhook CA bundles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TlsSecretValues {
    pub ca_cert: Vec<u8>,
    pub ca_key: Vec<u8>,
    pub signed_cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl TlsSecretValues {
    pub fn to_secret_data(&self) -> BTreeMap<String, ByteString> {
        [
            (TLS_CA_CERT_KEY, &self.ca_cert),
            (TLS_CA_KEY_KEY, &self.ca_key),
            (TLS_SIGNED_CERT_KEY, &self.signed_cert),
            (TLS_KEY_KEY, &self.key),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), ByteString(v.clone())))
        .collect()
    }

    /// Reads the values back from an existing TLS secret.
    pub fn from_secret_data(data: &BTreeMap<String, ByteString>) -> Result<Self> {
        let get = |key: &str| {
            data.get(key)
                .map(|v| v.0.clone())
                .ok_or_else(|| precondition_missing(format!("tls secret is missing the {key} key")))
        };
        Ok(TlsSecretValues {
            ca_cert: get(TLS_CA_CERT_KEY)?,
            ca_key: get(TLS_CA_KEY_KEY)?,
            signed_cert: get(TLS_SIGNED_CERT_KEY)?,
            key: get(TLS_KEY_KEY)?,
        })
    }
}

/// Issues TLS material for a service.
#[cfg_attr(test, mockall::automock)]
pub trait TlsSecretsValuesCreator: Send + Sync {
    fn create_tls_secrets_values(&self, service: &ObjectKey) -> Result<TlsSecretValues>;
}

/// Image registry credentials as handed out by the backend.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct RegistrySecretValues {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub data: BTreeMap<String, ByteString>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_values_read_back_from_secret_data() {
        let values = TlsSecretValues {
            ca_cert: b"ca".to_vec(),
            ca_key: b"ca-key".to_vec(),
            signed_cert: b"cert".to_vec(),
            key: b"key".to_vec(),
        };
        let data = values.to_secret_data();
        assert_eq!(data.len(), 4);
        assert_eq!(TlsSecretValues::from_secret_data(&data).unwrap(), values);
    }

    #[test]
    fn test_tls_values_missing_key() {
        let mut data = TlsSecretValues::default().to_secret_data();
        data.remove(TLS_CA_CERT_KEY);
        assert!(TlsSecretValues::from_secret_data(&data).is_err());
    }

    #[test]
    fn test_registry_values_decode_base64_data() {
        let values: RegistrySecretValues = serde_json::from_value(serde_json::json!({
            "type": "kubernetes.io/dockerconfigjson",
            "data": { ".dockerconfigjson": "e30=" }
        }))
        .unwrap();
        assert_eq!(values.type_, "kubernetes.io/dockerconfigjson");
        assert_eq!(values.data[".dockerconfigjson"].0, b"{}".to_vec());
    }
}
