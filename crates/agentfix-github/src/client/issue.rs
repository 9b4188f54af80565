//! Issue and issue comment operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::{collect_pages, RepositoryClient};
use crate::error::ApiError;

/// Open or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// Entry of the repository issues listing.
///
/// The listing also returns pull requests; those carry a
/// `pull_request` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: IssueState,
    #[serde(default)]
    pub user: Option<IssueUser>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    /// Whether this entry is really a pull request.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Author reference; only the login is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueUser {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Conversation comment on an issue or pull request.
///
/// Marker detection reads `body` and orders by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<IssueUser>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateIssueRequest {
    pub title: String,
    /// Markdown
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

/// Body of `PATCH /repos/{owner}/{repo}/issues/{number}`; unset fields are
/// left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateIssueRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCommentRequest {
    /// Markdown
    pub body: String,
}

impl RepositoryClient {
    /// List every issue (and pull request) carrying `label`, in any state.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn list_issues_with_label(&self, label: &str) -> Result<Vec<Issue>, ApiError> {
        let page_size = self.config().page_size;
        collect_pages(page_size, |page| async move {
            let [per_page, page_number] = page.query();
            let query = [
                ("state", "all".to_string()),
                ("labels", label.to_string()),
                per_page,
                page_number,
            ];
            self.get_json("issues", &query).await
        })
        .await
    }

    /// Create a new issue.
    #[instrument(skip(self, request), fields(repository = %self.repository()))]
    pub async fn create_issue(&self, request: &CreateIssueRequest) -> Result<Issue, ApiError> {
        self.send_json(reqwest::Method::POST, "issues", request)
            .await
    }

    /// Update an existing issue.
    #[instrument(skip(self, request), fields(repository = %self.repository()))]
    pub async fn update_issue(
        &self,
        issue_number: u64,
        request: &UpdateIssueRequest,
    ) -> Result<Issue, ApiError> {
        let path = format!("issues/{}", issue_number);
        self.send_json(reqwest::Method::PATCH, &path, request)
            .await
    }

    /// Reopen a closed issue.
    pub async fn reopen_issue(&self, issue_number: u64) -> Result<Issue, ApiError> {
        let request = UpdateIssueRequest {
            state: Some(IssueState::Open),
            ..Default::default()
        };
        self.update_issue(issue_number, &request).await
    }

    /// List every conversation comment on an issue or pull request.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn list_issue_comments(&self, issue_number: u64) -> Result<Vec<Comment>, ApiError> {
        let path = format!("issues/{}/comments", issue_number);
        let page_size = self.config().page_size;
        collect_pages(page_size, |page| {
            let path = path.clone();
            async move { self.get_json(&path, &page.query()).await }
        })
        .await
    }

    /// Post a conversation comment on an issue or pull request.
    #[instrument(skip(self, body), fields(repository = %self.repository()))]
    pub async fn create_issue_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<Comment, ApiError> {
        let path = format!("issues/{}/comments", issue_number);
        let request = CreateCommentRequest {
            body: body.to_string(),
        };
        self.send_json(reqwest::Method::POST, &path, &request)
            .await
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
