use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Error, Debug)]
pub enum StdError {
    #[error("JsonSerializationError: {0}")]
    JsonSerializationError(#[source] serde_json::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Finalizer Error: {0}")]
    // NB: awkward type because finalizer::Error embeds the reconciler error (which is this)
    // so boxing this error to break cycles
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    #[error("expected {expected} object, got {actual}")]
    UnexpectedObjectKind { expected: &'static str, actual: &'static str },

    #[error("PreconditionMissing: {0}")]
    PreconditionMissing(String),

    #[error("failed to {operation} {kind} {key}: {source}")]
    StoreError {
        operation: &'static str,
        kind: &'static str,
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("SerializationError: {0}")]
    SerializationError(String),

    #[error("HttpError: {0}")]
    HttpError(String),
}

impl StdError {
    pub fn metric_label(&self) -> String {
        let label = match self {
            StdError::JsonSerializationError(_) => "jsonserializationerror",
            StdError::KubeError(_) => "kubeerror",
            StdError::FinalizerError(_) => "finalizererror",
            StdError::MetadataMissing(_) => "metadatamissing",
            StdError::InvalidArgument(_) => "invalidargument",
            StdError::UnexpectedObjectKind { .. } => "unexpectedobjectkind",
            StdError::PreconditionMissing(_) => "preconditionmissing",
            StdError::StoreError { .. } => "storeerror",
            StdError::SerializationError(_) => "serializationerror",
            StdError::HttpError(_) => "httperror",
        };
        label.to_string()
    }
}

#[derive(Error, Debug)]
pub struct ErrorWithRequeue {
    pub duration: Duration,
    pub error: StdError,
}

impl ErrorWithRequeue {
    pub fn new(error: StdError, duration: Duration) -> ErrorWithRequeue {
        ErrorWithRequeue { error, duration }
    }

    pub fn metric_label(&self) -> String {
        self.error.metric_label()
    }
}

impl fmt::Display for ErrorWithRequeue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (requeue in {:?})", self.error, self.duration)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Standard Error: {0}")]
    StdError(#[source] StdError),

    #[error("Error With Requeue: {0}")]
    ErrorWithRequeue(#[source] ErrorWithRequeue),
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::StdError(e) => e.metric_label(),
            Error::ErrorWithRequeue(e) => e.metric_label(),
        }
    }
}

impl From<StdError> for Error {
    fn from(error: StdError) -> Self {
        Error::StdError(error)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shorthand for the type-mismatch error raised when a mutator receives the wrong object kind.
pub fn unexpected_kind(expected: &'static str, actual: &'static str) -> Error {
    Error::StdError(StdError::UnexpectedObjectKind { expected, actual })
}

pub fn precondition_missing(message: impl Into<String>) -> Error {
    Error::StdError(StdError::PreconditionMissing(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_label_is_variant_name() {
        let err = Error::StdError(StdError::InvalidArgument("bad".to_string()));
        assert_eq!(err.metric_label(), "invalidargument");

        let err = Error::ErrorWithRequeue(ErrorWithRequeue::new(
            StdError::PreconditionMissing("tls".to_string()),
            Duration::from_secs(10),
        ));
        assert_eq!(err.metric_label(), "preconditionmissing");
    }

    #[test]
    fn test_unexpected_kind_message() {
        let err = unexpected_kind("Deployment", "Service");
        assert_eq!(
            err.to_string(),
            "Standard Error: expected Deployment object, got Service"
        );
    }
}
