use std::time::Duration;

use http::StatusCode;

/// Classified outcome of a request that did not produce a usable response.
#[derive(Debug, thiserror::Error)]
pub enum TransportFailure {
    #[error("rate limited ({status}) for {endpoint}")]
    RateLimited {
        status: StatusCode,
        endpoint: String,
        /// Wait suggested by the server, when it sent one.
        retry_after: Option<Duration>,
    },
    #[error("server error {status} for {endpoint}")]
    ServerError { status: StatusCode, endpoint: String },
    #[error("client error {status} for {endpoint}: {message}")]
    ClientError {
        status: StatusCode,
        endpoint: String,
        message: String,
    },
    #[error("network error for {endpoint}: {source}")]
    NetworkError {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
}

impl TransportFailure {
    pub fn network(endpoint: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::NetworkError {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportFailure::RateLimited { status, .. }
            | TransportFailure::ServerError { status, .. }
            | TransportFailure::ClientError { status, .. } => Some(*status),
            TransportFailure::NetworkError { .. } => None,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            TransportFailure::RateLimited { endpoint, .. }
            | TransportFailure::ServerError { endpoint, .. }
            | TransportFailure::ClientError { endpoint, .. }
            | TransportFailure::NetworkError { endpoint, .. } => endpoint,
        }
    }

    /// Short label used for metrics and structured log fields.
    pub fn class(&self) -> &'static str {
        match self {
            TransportFailure::RateLimited { .. } => "rate_limited",
            TransportFailure::ServerError { .. } => "server_error",
            TransportFailure::ClientError { .. } => "client_error",
            TransportFailure::NetworkError { .. } => "network_error",
        }
    }

    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            TransportFailure::ClientError { status, .. } if *status == StatusCode::UNAUTHORIZED
        )
    }
}
