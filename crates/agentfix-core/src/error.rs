//! Error taxonomy for AgentFix runs.
//!
//! - Configuration failures are fatal before any network call.
//! - Authentication failures are fatal for the request that hit them.
//! - Upstream API failures abort the current run.
//! - Dispatch failures are not errors: they are recorded in a
//!   [`DispatchResult`](crate::dispatch::DispatchResult).
//! - Best-effort failures (follow-up comments) are logged and swallowed.

use agentfix_github::{ApiError, AuthError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatch::BatchSummary;

/// Standard result type for AgentFix operations.
pub type AgentFixResult<T> = Result<T, AgentFixError>;

/// Top-level error type for AgentFix operations.
#[derive(Debug, Error)]
pub enum AgentFixError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthError),

    #[error("Tracker API error: {0}")]
    Tracker(#[from] ApiError),

    #[error("Sentry API {status} {url}: {body}")]
    IssueSource {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Sentry request failed: {message}")]
    IssueSourceTransport { message: String },

    #[error("Hand-off file {path}: {message}")]
    Handoff { path: String, message: String },

    #[error("Pipeline stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    /// A run that failed after some records were already dispatched.
    #[error("Run aborted after {} dispatches: {source}", .dispatch.outcomes.len())]
    RunAborted {
        source: Box<AgentFixError>,
        dispatch: BatchSummary,
    },
}

impl AgentFixError {
    /// Check if the failure may clear up on a later run.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::Authentication(e) => e.is_transient(),
            Self::Tracker(e) => e.is_transient(),
            Self::IssueSource { status, .. } => *status >= 500 || *status == 429,
            Self::IssueSourceTransport { .. } => true,
            Self::Handoff { .. } => false,
            Self::Stage { .. } => false,
            Self::RunAborted { source, .. } => source.is_transient(),
        }
    }

    /// Upstream HTTP status, if the failure came from a response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Tracker(e) => e.status(),
            Self::IssueSource { status, .. } => Some(*status),
            Self::Authentication(AuthError::GitHubApiError { status, .. }) => Some(*status),
            Self::RunAborted { source, .. } => source.upstream_status(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
