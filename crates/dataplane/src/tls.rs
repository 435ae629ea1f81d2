use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::{
    TlsSecretValues, TlsSecretsValuesCreator, TLS_CA_CERT_KEY, TLS_CA_KEY_KEY, TLS_KEY_KEY, TLS_SIGNED_CERT_KEY,
};
use crate::objects::ObjectKey;
use crate::util::errors::{precondition_missing, Error, Result, StdError};

/// Serves TLS material issued out of band, one directory per service under `dir`.
///
/// `<dir>/<service name>/` holds `ca.crt`, `ca.key`, `signed_cert` and `key`.
pub struct FileTlsSecretsValuesCreator {
    dir: PathBuf,
}

impl FileTlsSecretsValuesCreator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileTlsSecretsValuesCreator { dir: dir.into() }
    }
}

fn read(dir: &Path, file: &str) -> Result<Vec<u8>> {
    let path = dir.join(file);
    fs::read(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => precondition_missing(format!("tls file {} does not exist", path.display())),
        _ => Error::StdError(StdError::InvalidArgument(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    })
}

impl TlsSecretsValuesCreator for FileTlsSecretsValuesCreator {
    fn create_tls_secrets_values(&self, service: &ObjectKey) -> Result<TlsSecretValues> {
        let dir = self.dir.join(&service.name);
        debug!("Reading tls values for {} from {}", service, dir.display());
        Ok(TlsSecretValues {
            ca_cert: read(&dir, TLS_CA_CERT_KEY)?,
            ca_key: read(&dir, TLS_CA_KEY_KEY)?,
            signed_cert: read(&dir, TLS_SIGNED_CERT_KEY)?,
            key: read(&dir, TLS_KEY_KEY)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_values_per_service() {
        let root = tempfile::tempdir().unwrap();
        let service_dir = root.path().join("cbcontainers-hardening-enforcer");
        fs::create_dir_all(&service_dir).unwrap();
        for (file, content) in [
            (TLS_CA_CERT_KEY, "ca"),
            (TLS_CA_KEY_KEY, "ca-key"),
            (TLS_SIGNED_CERT_KEY, "cert"),
            (TLS_KEY_KEY, "key"),
        ] {
            fs::write(service_dir.join(file), content).unwrap();
        }

        let creator = FileTlsSecretsValuesCreator::new(root.path());
        let values = creator
            .create_tls_secrets_values(&ObjectKey::namespaced(
                "cbcontainers-dataplane",
                "cbcontainers-hardening-enforcer",
            ))
            .unwrap();
        assert_eq!(values.ca_cert, b"ca".to_vec());
        assert_eq!(values.signed_cert, b"cert".to_vec());
    }

    #[test]
    fn test_missing_file_is_a_missing_precondition() {
        let root = tempfile::tempdir().unwrap();
        let creator = FileTlsSecretsValuesCreator::new(root.path());
        let err = creator
            .create_tls_secrets_values(&ObjectKey::namespaced("ns", "enforcer"))
            .unwrap_err();
        assert_eq!(err.metric_label(), "preconditionmissing");
    }
}
