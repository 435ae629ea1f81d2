use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_TLS_SECRETS_DIR: &str = "/etc/cbcontainers/tls";
pub const DEFAULT_REQUEUE_SECONDS: u64 = 300;

/// Process level settings; everything about the dataplane itself lives in the agent resource.
#[derive(Parser, Clone, Debug, PartialEq)]
#[command(name = "operator", about = "Reconciles the cbcontainers dataplane", long_about = None)]
pub struct OperatorConfig {
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// Root of the per-service TLS material directories
    #[arg(long, env = "TLS_SECRETS_DIR", default_value = DEFAULT_TLS_SECRETS_DIR)]
    pub tls_secrets_dir: PathBuf,

    #[arg(long, env = "REQUEUE_SECONDS", default_value_t = DEFAULT_REQUEUE_SECONDS)]
    pub requeue_seconds: u64,

    /// Skips kubelet version discovery when set
    #[arg(long, env = "KUBELET_VERSION")]
    pub kubelet_version: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            metrics_bind_address: DEFAULT_METRICS_BIND_ADDRESS.to_string(),
            tls_secrets_dir: PathBuf::from(DEFAULT_TLS_SECRETS_DIR),
            requeue_seconds: DEFAULT_REQUEUE_SECONDS,
            kubelet_version: None,
        }
    }
}

impl OperatorConfig {
    pub fn requeue(&self) -> Duration {
        Duration::from_secs(self.requeue_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = OperatorConfig::try_parse_from(["operator"]).unwrap();
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.requeue(), Duration::from_secs(300));
    }

    #[test]
    fn test_reads_every_setting() {
        let config = OperatorConfig::try_parse_from([
            "operator",
            "--metrics-bind-address",
            "127.0.0.1:9090",
            "--tls-secrets-dir",
            "/run/tls",
            "--requeue-seconds",
            "60",
            "--kubelet-version",
            "v1.21.4",
        ])
        .unwrap();
        assert_eq!(config.metrics_bind_address, "127.0.0.1:9090");
        assert_eq!(config.tls_secrets_dir, PathBuf::from("/run/tls"));
        assert_eq!(config.requeue(), Duration::from_secs(60));
        assert_eq!(config.kubelet_version.as_deref(), Some("v1.21.4"));
    }

    #[test]
    fn test_invalid_requeue_seconds() {
        let err = OperatorConfig::try_parse_from(["operator", "--requeue-seconds", "soon"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
