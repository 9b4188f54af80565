//! Error types for the HTTP service

use agentfix_core::{AgentFixError, ConfigError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: the payload is not JSON or has the wrong shape
/// - `401 Unauthorized`: the signature header is missing or does not match
/// - `500 Internal Server Error`: configuration or authentication failures
/// - `502 Bad Gateway`: an upstream API rejected a request
///
/// The response body is `{ok: false, error, status, timestamp}`. Internal
/// failures are logged in full and reported with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Signature verification failed
    ///
    /// Maps to: `401 Unauthorized`
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Payload could not be parsed after a valid signature
    ///
    /// Maps to: `400 Bad Request`
    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    /// Handling an actionable review failed
    ///
    /// Maps to `502` for upstream API failures and `500` otherwise.
    #[error(transparent)]
    Dispatch(#[from] AgentFixError),
}

impl WebhookHandlerError {
    /// Status code returned to the sender.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Self::Dispatch(e) => match e {
                AgentFixError::Tracker(_)
                | AgentFixError::IssueSource { .. }
                | AgentFixError::IssueSourceTransport { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::InvalidSignature => {
                warn!("Rejected webhook with invalid signature");
                self.to_string()
            }
            Self::InvalidPayload { message } => {
                warn!(error = %message, "Rejected malformed webhook payload");
                self.to_string()
            }
            Self::Dispatch(e) if status == StatusCode::BAD_GATEWAY => {
                error!(error = %e, upstream_status = ?e.upstream_status(), "Upstream failure while handling review");
                e.to_string()
            }
            Self::Dispatch(e) => {
                error!(error = %e, "Internal failure while handling review");
                "Internal server error occurred. Please try again later.".to_string()
            }
        };

        let body = serde_json::json!({
            "ok": false,
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Startup failed: {0}")]
    Startup(#[from] AgentFixError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
