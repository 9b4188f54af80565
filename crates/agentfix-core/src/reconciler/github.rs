//! GitHub-backed tracker and event log.

use async_trait::async_trait;
use chrono::Duration;
use tracing::debug;

use agentfix_github::auth::{AppAuthenticator, AuthenticationProvider, InstallationId};
use agentfix_github::client::{ClientConfig, CreateIssueRequest, RepositoryClient};

use crate::config::{AgentFixConfig, ConfigError};
use crate::error::AgentFixResult;
use crate::reconciler::event_log::{events_from_comments, EventLog, MarkerEvent};
use crate::reconciler::{IssueTracker, TrackedIssue};

/// Issue tracker and marker log backed by one GitHub repository.
#[derive(Debug, Clone)]
pub struct GitHubTracker {
    client: RepositoryClient,
}

impl GitHubTracker {
    pub fn new(client: RepositoryClient) -> Self {
        Self { client }
    }

    /// Build a tracker for the configured repository.
    ///
    /// Uses `tracker.token` when present. Otherwise an installation token is
    /// minted for `github_app.installation_id`; that token lives only as long
    /// as the returned tracker and must cover [`run_work_budget`].
    pub async fn connect(config: &AgentFixConfig) -> AgentFixResult<Self> {
        Ok(Self::new(connect_repository(config).await?))
    }

    pub fn client(&self) -> &RepositoryClient {
        &self.client
    }
}

/// Time reserved for listing tracked issues and their comment histories.
pub const TRACKER_SCAN_SECONDS: u64 = 600;

/// Upper bound on any work budget; installation tokens never live this long.
const MAX_WORK_SECONDS: u64 = 86_400;

/// How long a minted tracker token must stay valid for one run: the tracker
/// scan plus `dispatch.max_fixes` remediation calls at their full timeout.
pub fn run_work_budget(config: &AgentFixConfig) -> Duration {
    let dispatch = config
        .remediation
        .timeout_seconds
        .saturating_mul(config.dispatch.max_fixes as u64);
    let seconds = dispatch
        .saturating_add(TRACKER_SCAN_SECONDS)
        .min(MAX_WORK_SECONDS);
    Duration::seconds(seconds as i64)
}

/// Client settings for the configured GitHub API.
pub fn client_config(config: &AgentFixConfig) -> ClientConfig {
    ClientConfig::default()
        .with_github_api_url(config.github_app.api_base_url.clone())
        .with_page_size(config.tracker.page_size)
}

/// Authenticated client for the configured tracker repository.
///
/// # Errors
///
/// `Authentication(AuthError::TokenExpired)` when a minted token would lapse
/// before [`run_work_budget`] elapses.
pub async fn connect_repository(config: &AgentFixConfig) -> AgentFixResult<RepositoryClient> {
    let repository = config.tracker.repository_name()?;

    if let Some(token) = config.tracker.token() {
        debug!(repository = %repository, "Using configured tracker token");
        return Ok(RepositoryClient::new(
            client_config(config),
            repository,
            token.expose(),
        )?);
    }

    let installation_id = config
        .github_app
        .installation_id
        .map(InstallationId::new)
        .ok_or_else(|| ConfigError::Missing {
            keys: vec!["tracker.token or github_app.installation_id".to_string()],
        })?;
    let (app_id, private_key) = config.github_app.credentials()?;
    let authenticator =
        AppAuthenticator::new(app_id, private_key, config.github_app.api_base_url.clone())?;
    let token = authenticator.installation_token(installation_id).await?;
    token.ensure_valid_for(run_work_budget(config))?;

    debug!(repository = %repository, installation_id = %installation_id, "Minted installation token");
    Ok(RepositoryClient::for_installation(
        client_config(config),
        repository,
        &token,
    )?)
}

#[async_trait]
impl IssueTracker for GitHubTracker {
    async fn list_tracked_issues(&self, label: &str) -> AgentFixResult<Vec<TrackedIssue>> {
        let issues = self.client.list_issues_with_label(label).await?;
        Ok(issues
            .into_iter()
            .map(|issue| TrackedIssue {
                is_pull_request: issue.is_pull_request(),
                number: issue.number,
                title: issue.title,
                state: issue.state,
                created_at: issue.created_at,
            })
            .collect())
    }

    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> AgentFixResult<u64> {
        let request = CreateIssueRequest {
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
        };
        Ok(self.client.create_issue(&request).await?.number)
    }

    async fn reopen_issue(&self, issue_number: u64) -> AgentFixResult<()> {
        self.client.reopen_issue(issue_number).await?;
        Ok(())
    }

    async fn post_comment(&self, issue_number: u64, body: &str) -> AgentFixResult<()> {
        self.client.create_issue_comment(issue_number, body).await?;
        Ok(())
    }
}

#[async_trait]
impl EventLog for GitHubTracker {
    async fn list_events(&self, issue_number: u64) -> AgentFixResult<Vec<MarkerEvent>> {
        let comments = self.client.list_issue_comments(issue_number).await?;
        Ok(events_from_comments(comments.iter().map(|comment| {
            (comment.body.as_deref().unwrap_or_default(), comment.created_at)
        })))
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
