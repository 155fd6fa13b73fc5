//! Error types for a3s-playground

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors raised by the relay, the upstream client and the relay transport.
#[derive(Debug, thiserror::Error)]
pub enum PlaygroundError {
    /// The caller sent an unusable request. Never reaches the upstream.
    #[error("{0}")]
    ClientInput(String),

    /// The upstream (or the relay, seen from the adapter) answered non-2xx.
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream reported a failure after the stream had started.
    #[error("Upstream stream failed: {0}")]
    UpstreamStream(String),

    /// A response or stream event could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Network failure talking to the upstream or the relay.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, PlaygroundError>;

impl PlaygroundError {
    /// HTTP status the relay answers with for this error.
    ///
    /// Only bad requests are told apart; every upstream-side failure is a
    /// generic gateway error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ClientInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. }
            | Self::UpstreamStream(_)
            | Self::MalformedResponse(_)
            | Self::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PlaygroundError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "Relay request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_input_is_bad_request() {
        let err = PlaygroundError::ClientInput("Invalid or missing messages".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Invalid or missing messages");
    }

    #[test]
    fn test_upstream_failures_are_bad_gateway() {
        let err = PlaygroundError::Upstream {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Upstream returned 401: invalid api key");

        let err = PlaygroundError::UpstreamStream("reset".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_other_errors_are_internal() {
        let err = PlaygroundError::Config("missing key".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_into_response_plain_text() {
        let response =
            PlaygroundError::ClientInput("Invalid or missing messages".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Invalid or missing messages");
    }
}
