//! Error types for GitHub operations.
//!
//! Every error that leaves this crate carries enough context for the caller to
//! decide whether the failure is worth retrying on a later run. Nothing in this
//! crate retries on its own.

use thiserror::Error;

use crate::auth::InstallationId;

/// Upstream response bodies are cut to this many characters.
pub const MAX_ERROR_BODY_CHARS: usize = 300;

pub fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

fn retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Failures minting App or installation credentials.
///
/// Each one is fatal for the request that triggered it.
#[derive(Debug, Error)]
pub enum AuthError {
    /// 401 from the token exchange.
    #[error("GitHub rejected the App credentials")]
    InvalidCredentials,

    /// 404 from the token exchange.
    #[error("Installation {installation_id} is unknown or inaccessible to this App")]
    InstallationNotFound { installation_id: InstallationId },

    #[error("Installation token would expire before the work completes")]
    TokenExpired,

    #[error("Cannot determine the installation: {message}")]
    MissingInstallation { message: String },

    #[error("Private key unusable: {message}")]
    InvalidPrivateKey { message: String },

    #[error("Cannot sign App assertion: {message}")]
    JwtGenerationFailed { message: String },

    /// Any other non-success response from the App API.
    #[error("GitHub API {status} {url}: {message}")]
    GitHubApiError {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Transport failure: {0}")]
    NetworkError(String),

    /// Token exchange succeeded but its body did not decode.
    #[error("Malformed token response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Whether a later run could succeed without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TokenExpired | Self::NetworkError(_) => true,
            Self::GitHubApiError { status, .. } => retryable_status(*status),
            _ => false,
        }
    }
}

/// Failures of repository REST calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success response. The body is truncated to [`MAX_ERROR_BODY_CHARS`].
    #[error("GitHub API {status} {url}: {message}")]
    HttpError {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Cannot build request: {message}")]
    InvalidRequest { message: String },

    #[error("Undecodable GitHub response: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Request to GitHub failed: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => retryable_status(*status),
            Self::HttpClientError(_) => true,
            Self::InvalidRequest { .. } | Self::JsonError(_) => false,
        }
    }

    /// Response status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            Self::HttpClientError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Rejected local input: ids, signatures and names.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is malformed: {message}")]
    InvalidFormat { field: String, message: String },

    /// `X-Hub-Signature-256` is not `sha256=<hex>`.
    #[error("Malformed webhook signature: {message}")]
    InvalidSignatureFormat { message: String },

    #[error("Cannot compute HMAC: {message}")]
    HmacError { message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
