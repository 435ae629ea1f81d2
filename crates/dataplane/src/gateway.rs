use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::{error, info};

use crate::api::v1::agent::CBContainersAgentSpec;
use crate::models::RegistrySecretValues;
use crate::util::errors::{Error, Result, StdError};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const REGISTRY_SECRET_RESOURCE: &str = "registry_secret";

/// Client of the backend's management API, scoped to one account.
pub struct ApiGateway {
    base_url: String,
    client: reqwest::Client,
}

impl ApiGateway {
    /// Builds a client for the API gateway named in `spec`, authenticating with `access_token`.
    pub fn new(spec: &CBContainersAgentSpec, access_token: &str) -> Result<Self> {
        let tls = &spec.gateways.gateway_tls;

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(access_token).map_err(|_| {
            Error::StdError(StdError::InvalidArgument(
                "access token is not a valid header value".to_string(),
            ))
        })?;
        token.set_sensitive(true);
        headers.insert(AUTH_TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(tls.insecure_skip_verify);
        if !tls.root_cas_bundle.is_empty() {
            let certificates = reqwest::Certificate::from_pem_bundle(tls.root_cas_bundle.as_bytes())
                .map_err(|e| {
                    Error::StdError(StdError::InvalidArgument(format!(
                        "failed to parse root certificates: {e}"
                    )))
                })?;
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
        let client = builder.build().map_err(|e| {
            Error::StdError(StdError::HttpError(format!("failed to build gateway client: {e}")))
        })?;

        Ok(ApiGateway {
            base_url: account_url(spec),
            client,
        })
    }

    fn management_url(&self, resource: &str) -> String {
        format!("{}/management/{}", self.base_url, resource)
    }

    /// Fetches the image registry credentials the dataplane pulls its images with.
    pub async fn get_registry_secret(&self) -> Result<RegistrySecretValues> {
        let url = self.management_url(REGISTRY_SECRET_RESOURCE);
        info!("Fetching registry secret from {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Failed to connect to the api gateway: {}", e);
            Error::StdError(StdError::HttpError(format!("Registry secret request failed: {}", e)))
        })?;

        if !response.status().is_success() {
            error!("Api gateway returned error status: {}", response.status());
            return Err(Error::StdError(StdError::HttpError(format!(
                "Api gateway returned {} for the registry secret",
                response.status()
            ))));
        }

        let body = response.text().await.map_err(|e| {
            Error::StdError(StdError::HttpError(format!("Failed to read registry secret response: {}", e)))
        })?;
        decode_registry_secret(&body)
    }
}

fn account_url(spec: &CBContainersAgentSpec) -> String {
    let gateway = &spec.gateways.api_gateway;
    format!(
        "{}://{}:{}/{}/v1/orgs/{}",
        gateway.scheme, gateway.host, gateway.port, gateway.adapter, spec.account
    )
}

fn decode_registry_secret(body: &str) -> Result<RegistrySecretValues> {
    serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse registry secret response: {}", e);
        Error::StdError(StdError::SerializationError(format!(
            "Failed to parse registry secret JSON: {}",
            e
        )))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_spec;

    #[test]
    fn test_registry_secret_url() {
        let mut spec = sample_spec();
        spec.gateways.api_gateway.port = 8443;
        let gateway = ApiGateway::new(&spec, "token").unwrap();
        assert_eq!(
            gateway.management_url(REGISTRY_SECRET_RESOURCE),
            "https://api.example.com:8443/containers/v1/orgs/org-key/management/registry_secret"
        );
    }

    #[test]
    fn test_access_token_must_be_a_header_value() {
        let result = ApiGateway::new(&sample_spec(), "bad\ntoken");
        assert!(matches!(
            result,
            Err(Error::StdError(StdError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn test_decode_registry_secret() {
        let values = decode_registry_secret(
            r#"{"type":"kubernetes.io/dockerconfigjson","data":{".dockerconfigjson":"e30="}}"#,
        )
        .unwrap();
        assert_eq!(values.type_, "kubernetes.io/dockerconfigjson");
        assert_eq!(values.data[".dockerconfigjson"].0, b"{}".to_vec());

        let err = decode_registry_secret("<html>maintenance</html>").unwrap_err();
        assert_eq!(err.metric_label(), "serializationerror");
    }
}
