//! Repository-scoped GitHub REST client.
//!
//! [`RepositoryClient`] covers the small slice of the REST API AgentFix
//! needs: issues, issue comments and pull request review comments. Every
//! non-success response is turned into [`ApiError::HttpError`] carrying the
//! status code and a truncated body.

mod issue;
mod pagination;
mod pull_request;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

use crate::auth::InstallationToken;
use crate::error::{truncate_body, ApiError, ValidationError};

pub use issue::{
    Comment, CreateCommentRequest, CreateIssueRequest, Issue, IssueState, IssueUser, Label,
    UpdateIssueRequest,
};
pub use pagination::{collect_pages, is_last_page, PageRequest, DEFAULT_PAGE_SIZE};
pub use pull_request::PullRequestReviewComment;

/// User agent sent with every request.
pub const USER_AGENT: &str = "agentfix";

/// Media type requested from the REST API.
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

// ============================================================================
// Repository Name
// ============================================================================

/// An `owner/repo` pair.
///
/// # Examples
///
/// ```
/// use agentfix_github::client::RepositoryName;
///
/// let repo: RepositoryName = "acme/widgets".parse().unwrap();
/// assert_eq!(repo.owner(), "acme");
/// assert_eq!(repo.repo(), "widgets");
/// assert!("acme".parse::<RepositoryName>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryName {
    owner: String,
    repo: String,
}

impl RepositoryName {
    /// Owner login.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepositoryName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '/');
        let owner = parts.next().unwrap_or_default().trim();
        let repo = parts.next().unwrap_or_default().trim();

        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(ValidationError::InvalidFormat {
                field: "repository".to_string(),
                message: format!("expected owner/repo, got '{}'", s),
            });
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for GitHub API client behavior.
///
/// # Examples
///
/// ```
/// use agentfix_github::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_page_size(50);
/// assert_eq!(config.page_size, 50);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests (required by GitHub)
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
    /// Items requested per page on list endpoints
    pub page_size: u32,
    /// GitHub API base URL
    pub github_api_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
            github_api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the page size, clamped to GitHub's 1..=100 range.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    /// Set the GitHub API base URL.
    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

// ============================================================================
// Repository Client
// ============================================================================

/// Token-authenticated client bound to one repository.
///
/// The token is either an installation token minted for this run or a
/// pre-issued repository token supplied through configuration.
#[derive(Clone)]
pub struct RepositoryClient {
    http_client: reqwest::Client,
    config: ClientConfig,
    repository: RepositoryName,
    token: Zeroizing<String>,
}

impl RepositoryClient {
    /// Create a client for `repository` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::HttpClientError` if the HTTP client cannot be built.
    pub fn new(
        config: ClientConfig,
        repository: RepositoryName,
        token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http_client,
            config,
            repository,
            token: Zeroizing::new(token.into()),
        })
    }

    /// Create a client from an installation token.
    pub fn for_installation(
        config: ClientConfig,
        repository: RepositoryName,
        token: &InstallationToken,
    ) -> Result<Self, ApiError> {
        Self::new(config, repository, token.token())
    }

    /// The repository this client is bound to.
    pub fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        format!(
            "{}/repos/{}/{}/{}",
            self.config.github_api_url, self.repository.owner, self.repository.repo, path
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Authorization", format!("token {}", self.token.as_str()))
            .header("Accept", GITHUB_ACCEPT)
    }

    /// GET a repository-relative path and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self
            .request(reqwest::Method::GET, &url)
            .query(query)
            .send()
            .await?;
        decode_response(response, url).await
    }

    /// Send a JSON body to a repository-relative path and decode the reply.
    pub(crate) async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Sending request");
        let response = self.request(method, &url).json(body).send().await?;
        decode_response(response, url).await
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    url: String,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::HttpError {
            status: status.as_u16(),
            url,
            message: truncate_body(&body),
        });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl fmt::Debug for RepositoryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryClient")
            .field("repository", &self.repository)
            .field("config", &self.config)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
