//! Pull request review comment operations.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::{collect_pages, IssueUser, RepositoryClient};
use crate::error::ApiError;

/// Inline review comment attached to a line of a pull request diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestReviewComment {
    /// Unique comment identifier
    pub id: u64,

    /// File the comment is attached to
    #[serde(default)]
    pub path: Option<String>,

    /// Line in the current diff, if still present
    #[serde(default)]
    pub line: Option<u64>,

    /// Line in the diff the comment was originally made on
    #[serde(default)]
    pub original_line: Option<u64>,

    /// Comment body (Markdown)
    #[serde(default)]
    pub body: String,

    /// Comment author
    #[serde(default)]
    pub user: Option<IssueUser>,
}

impl PullRequestReviewComment {
    /// The current line, falling back to the original line.
    pub fn effective_line(&self) -> Option<u64> {
        self.line.or(self.original_line)
    }

    /// Author login, if known.
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }
}

impl RepositoryClient {
    /// List every inline review comment on a pull request.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn list_pull_request_review_comments(
        &self,
        pull_number: u64,
    ) -> Result<Vec<PullRequestReviewComment>, ApiError> {
        let path = format!("pulls/{}/comments", pull_number);
        let page_size = self.config().page_size;
        collect_pages(page_size, |page| {
            let path = path.clone();
            async move { self.get_json(&path, &page.query()).await }
        })
        .await
    }
}

#[cfg(test)]
#[path = "pull_request_tests.rs"]
mod tests;
