use tracing_subscriber::{prelude::*, EnvFilter, Registry};

use crate::util::errors::{Error, Result, StdError};

/// Fetch an opentelemetry::trace::TraceId as hex through the full tracing stack
pub fn get_trace_id() -> opentelemetry::trace::TraceId {
    use opentelemetry::trace::TraceContextExt as _;
    use tracing_opentelemetry::OpenTelemetrySpanExt as _;
    tracing::Span::current()
        .context()
        .span()
        .span_context()
        .trace_id()
}

#[cfg(feature = "telemetry")]
async fn init_tracer() -> Result<opentelemetry::sdk::trace::Tracer> {
    let otlp_endpoint = std::env::var("OPENTELEMETRY_ENDPOINT_URL").map_err(|_| {
        Error::StdError(StdError::InvalidArgument(
            "OPENTELEMETRY_ENDPOINT_URL must be set when telemetry is enabled".to_string(),
        ))
    })?;

    let channel = tonic::transport::Channel::from_shared(otlp_endpoint)
        .map_err(|e| Error::StdError(StdError::InvalidArgument(e.to_string())))?
        .connect()
        .await
        .map_err(|e| Error::StdError(StdError::HttpError(e.to_string())))?;

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_channel(channel))
        .with_trace_config(opentelemetry::sdk::trace::config().with_resource(
            opentelemetry::sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                "cbcontainers-operator",
            )]),
        ))
        .install_batch(opentelemetry::runtime::Tokio)
        .map_err(|e| Error::StdError(StdError::InvalidArgument(e.to_string())))
}

/// Initialize tracing
pub async fn init() -> Result<()> {
    // Setup tracing layers
    #[cfg(feature = "telemetry")]
    let telemetry = tracing_opentelemetry::layer().with_tracer(init_tracer().await?);
    let logger = tracing_subscriber::fmt::layer().compact();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| Error::StdError(StdError::InvalidArgument(e.to_string())))?;

    let collector = Registry::default().with(logger).with(env_filter);
    #[cfg(feature = "telemetry")]
    let collector = collector.with(telemetry);

    // Initialize tracing
    tracing::subscriber::set_global_default(collector)
        .map_err(|e| Error::StdError(StdError::InvalidArgument(e.to_string())))
}
