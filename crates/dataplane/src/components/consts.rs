//! Names, keys and paths shared by the dataplane components and the agents they run.

pub const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";

pub const APP_NAME_LABEL_KEY: &str = "app.kubernetes.io/name";

pub const PROMETHEUS_SCRAPE_ANNOTATION: &str = "prometheus.io/scrape";
pub const PROMETHEUS_PORT_ANNOTATION: &str = "prometheus.io/port";

pub const DATAPLANE_CONFIGMAP_NAME: &str = "cbcontainers-dataplane-config";
pub const REGISTRY_SECRET_NAME: &str = "cbcontainers-registry-secret";
pub const DATAPLANE_PRIORITY_CLASS_NAME: &str = "cbcontainers-dataplane-priority-class";

pub const DATAPLANE_SERVICE_ACCOUNT_NAME: &str = "cbcontainers-operator";
pub const AGENT_NODE_SERVICE_ACCOUNT_NAME: &str = "cbcontainers-agent-node";
pub const STATE_REPORTER_SERVICE_ACCOUNT_NAME: &str = "cbcontainers-state-reporter";
pub const ENFORCER_SERVICE_ACCOUNT_NAME: &str = "cbcontainers-enforcer";
pub const MONITOR_SERVICE_ACCOUNT_NAME: &str = "cbcontainers-monitor";
pub const RUNTIME_RESOLVER_SERVICE_ACCOUNT_NAME: &str = "cbcontainers-runtime-resolver";

pub const DATAPLANE_CONFIGMAP_ACCOUNT_KEY: &str = "Account";
pub const DATAPLANE_CONFIGMAP_CLUSTER_KEY: &str = "Cluster";
pub const DATAPLANE_CONFIGMAP_AGENT_VERSION_KEY: &str = "AgentVersion";
pub const DATAPLANE_CONFIGMAP_DATAPLANE_NAMESPACE_KEY: &str = "DataplaneNamespace";
pub const DATAPLANE_CONFIGMAP_API_SCHEME_KEY: &str = "ApiScheme";
pub const DATAPLANE_CONFIGMAP_API_HOST_KEY: &str = "ApiHost";
pub const DATAPLANE_CONFIGMAP_API_PORT_KEY: &str = "ApiPort";
pub const DATAPLANE_CONFIGMAP_API_ADAPTER_KEY: &str = "ApiAdapter";
pub const DATAPLANE_CONFIGMAP_TLS_SKIP_VERIFY_KEY: &str = "TLS.SkipVerify";
pub const DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_PATH_KEY: &str = "TLS.RootCAsPath";

/// Where the root CA bundle is mounted, and its key in the configmap.
pub const DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_DIR_PATH: &str = "/etc/gateway-certs";
pub const DATAPLANE_CONFIGMAP_TLS_ROOT_CAS_FILE_PATH: &str = "root.pem";
pub const ROOT_CAS_VOLUME_NAME: &str = "root-cas";

pub const ACCESS_TOKEN_SECRET_KEY: &str = "accessToken";

/// 0644
pub const DEFAULT_VOLUME_MODE: i32 = 420;

pub const TLS_SECRET_VOLUME_NAME: &str = "cert";
pub const TLS_SECRET_VOLUME_MOUNT_PATH: &str = "/etc/octarine-certificates";

pub const MONITOR_NAME: &str = "cbcontainers-monitor";
pub const ENFORCER_NAME: &str = "cbcontainers-hardening-enforcer";
pub const ENFORCER_TLS_NAME: &str = "cbcontainers-hardening-enforcer-tls";
pub const STATE_REPORTER_NAME: &str = "cbcontainers-hardening-state-reporter";
pub const RESOLVER_NAME: &str = "cbcontainers-runtime-resolver";
pub const IMAGE_SCANNING_REPORTER_NAME: &str = "cbcontainers-image-scanning-reporter";
pub const IMAGE_SCANNING_REPORTER_TLS_NAME: &str = "cbcontainers-hardening-image-scanning-reporter-tls";
pub const DAEMON_SET_NAME: &str = "cbcontainers-node-agent";
pub const RUNTIME_CONTAINER_NAME: &str = "cbcontainers-runtime";
pub const CLUSTER_SCANNER_CONTAINER_NAME: &str = "cbcontainers-cluster-scanner";

pub const HTTPS_PORT_NAME: &str = "https";
pub const GRPC_PORT_NAME: &str = "grpc";
pub const METRICS_PORT_NAME: &str = "metrics";

pub const ENFORCER_CONTAINER_PORT: i32 = 8080;
pub const IMAGE_SCANNING_REPORTER_CONTAINER_PORT: i32 = 443;
pub const HTTPS_SERVICE_PORT: i32 = 443;

/// In-cluster DNS name of a dataplane service.
pub fn service_address(name: &str, namespace: &str) -> String {
    format!("{name}.{namespace}.svc.cluster.local")
}
