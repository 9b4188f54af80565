//! # Sentry Issue Source
//!
//! Reads unresolved issues from Sentry and enriches each with a stack trace
//! rendered from its latest event. Issues are fetched fresh on every run.
//!
//! Listing across projects and loading each issue's latest event are
//! independent reads, so both fan out with `try_join_all`. The first failure
//! aborts the whole fetch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use agentfix_github::error::truncate_body;

use crate::config::{ConfigError, SentryConfig};
use crate::error::{AgentFixError, AgentFixResult};

/// Placeholder when the latest event could not be found.
pub const NO_EVENT_DATA: &str = "No event data available";

/// Placeholder when the latest event has no exception entry.
pub const NO_STACK_TRACE: &str = "No stack trace available";

/// Project slug used when Sentry omits it.
pub const UNKNOWN_PROJECT: &str = "unknown";

// ============================================================================
// External Issue
// ============================================================================

/// An unresolved issue reported by Sentry.
///
/// Serialized with camelCase keys so hand-off files stay readable by every
/// stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIssue {
    pub id: String,
    pub project: String,
    pub short_id: String,
    pub title: String,
    #[serde(default)]
    pub culprit: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub count: String,
    #[serde(default)]
    pub level: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub stack_trace: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Sentry reports event counts as strings; older hand-off files carry numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Source of externally reported issues.
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Fetch every unresolved issue, most recently seen first.
    async fn fetch_unresolved(&self) -> AgentFixResult<Vec<ExternalIssue>>;
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueSummary {
    id: String,
    short_id: String,
    title: String,
    #[serde(default)]
    culprit: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    count: String,
    #[serde(default)]
    level: Option<String>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    #[serde(default)]
    project: Option<ProjectRef>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LatestEvent {
    #[serde(default)]
    entries: Vec<EventEntry>,
    #[serde(default)]
    tags: Vec<EventTag>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EventTag {
    key: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExceptionData {
    #[serde(default)]
    values: Vec<ExceptionValue>,
}

#[derive(Debug, Deserialize)]
struct ExceptionValue {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    stacktrace: Option<Stacktrace>,
}

#[derive(Debug, Default, Deserialize)]
struct Stacktrace {
    #[serde(default)]
    frames: Vec<Frame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    line_no: Option<u64>,
    #[serde(default)]
    col_no: Option<u64>,
    #[serde(default)]
    in_app: Option<bool>,
}

// ============================================================================
// Stack Trace Rendering
// ============================================================================

/// Render the exception entries of an event as text.
///
/// Each exception becomes `Type: value` followed by its in-app frames,
/// innermost first, as `  at fn (file:line:col)`.
fn render_stack_trace(event: &LatestEvent) -> String {
    let Some(entry) = event.entries.iter().find(|e| e.kind == "exception") else {
        return NO_STACK_TRACE.to_string();
    };

    let data: ExceptionData = serde_json::from_value(entry.data.clone()).unwrap_or_default();
    if data.values.is_empty() {
        return NO_STACK_TRACE.to_string();
    }

    data.values
        .iter()
        .map(|exception| {
            let frames = exception
                .stacktrace
                .as_ref()
                .map(|s| s.frames.as_slice())
                .unwrap_or_default();

            let frame_lines: Vec<String> = frames
                .iter()
                .filter(|frame| frame.in_app.unwrap_or(false))
                .rev()
                .map(|frame| {
                    format!(
                        "  at {} ({}:{}:{})",
                        frame.function.as_deref().filter(|f| !f.is_empty()).unwrap_or("?"),
                        frame.filename.as_deref().unwrap_or("unknown"),
                        frame.line_no.unwrap_or(0),
                        frame.col_no.unwrap_or(0)
                    )
                })
                .collect();

            format!(
                "{}: {}\n{}",
                exception.kind.as_deref().unwrap_or("Error"),
                exception.value.as_deref().unwrap_or_default(),
                frame_lines.join("\n")
            )
            .trim()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Trim, drop blanks and remove repeated project slugs, keeping order.
pub fn unique_projects(projects: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    projects
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty() && seen.insert(p.clone()))
        .collect()
}

// ============================================================================
// Sentry Client
// ============================================================================

/// Bearer-authenticated Sentry API client scoped to one organization.
pub struct SentryClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Zeroizing<String>,
    org: String,
    projects: Vec<String>,
    max_issues: u32,
}

impl SentryClient {
    /// Create a client for `org` reading `projects`.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        org: impl Into<String>,
        projects: &[String],
        max_issues: u32,
    ) -> AgentFixResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(agentfix_github::client::USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AgentFixError::IssueSourceTransport {
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Zeroizing::new(token.into()),
            org: org.into(),
            projects: unique_projects(projects),
            max_issues,
        })
    }

    /// Create a client from the `sentry` configuration section.
    pub fn from_config(config: &SentryConfig) -> AgentFixResult<Self> {
        let mut missing = Vec::new();
        let token = config.auth_token.as_ref().filter(|t| !t.is_blank());
        if token.is_none() {
            missing.push("sentry.auth_token".to_string());
        }
        let org = config.org.as_deref().map(str::trim).filter(|o| !o.is_empty());
        if org.is_none() {
            missing.push("sentry.org".to_string());
        }

        match (token, org) {
            (Some(token), Some(org)) => Self::new(
                &config.url,
                token.expose(),
                org,
                &config.projects,
                config.max_issues,
            ),
            _ => Err(ConfigError::Missing { keys: missing }.into()),
        }
    }

    /// Projects this client reads, deduplicated.
    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    async fn get(&self, path: &str) -> AgentFixResult<Option<reqwest::Response>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.token.as_str())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| AgentFixError::IssueSourceTransport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), url = %url, "Sentry request rejected");
            return Err(AgentFixError::IssueSource {
                status: status.as_u16(),
                url,
                body: truncate_body(&body),
            });
        }
        Ok(Some(response))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AgentFixResult<Option<T>> {
        match self.get(path).await? {
            None => Ok(None),
            Some(response) => response.json::<T>().await.map(Some).map_err(|e| {
                AgentFixError::IssueSourceTransport {
                    message: format!("invalid response for {}: {}", path, e),
                }
            }),
        }
    }

    /// List unresolved issues for one project, newest first.
    ///
    /// A missing project is an error, unlike a missing latest event.
    async fn list_project_issues(&self, project: &str) -> AgentFixResult<Vec<IssueSummary>> {
        let path = format!(
            "/api/0/projects/{}/{}/issues/?query=is:unresolved&sort=date&limit={}",
            self.org, project, self.max_issues
        );
        match self.get_json::<Vec<IssueSummary>>(&path).await? {
            Some(issues) => Ok(issues),
            None => Err(AgentFixError::IssueSource {
                status: 404,
                url: format!("{}{}", self.base_url, path),
                body: format!("project '{}' not found", project),
            }),
        }
    }

    async fn latest_event(&self, issue_id: &str) -> AgentFixResult<Option<LatestEvent>> {
        let path = format!(
            "/api/0/organizations/{}/issues/{}/events/latest/",
            self.org, issue_id
        );
        self.get_json(&path).await
    }

    async fn enrich(&self, summary: IssueSummary) -> AgentFixResult<ExternalIssue> {
        let event = self.latest_event(&summary.id).await?;

        let (stack_trace, tags) = match event {
            Some(event) => {
                let tags = event
                    .tags
                    .iter()
                    .map(|t| (t.key.clone(), t.value.clone()))
                    .collect();
                (render_stack_trace(&event), tags)
            }
            None => (NO_EVENT_DATA.to_string(), BTreeMap::new()),
        };

        Ok(ExternalIssue {
            id: summary.id,
            project: summary
                .project
                .and_then(|p| p.slug)
                .unwrap_or_else(|| UNKNOWN_PROJECT.to_string()),
            short_id: summary.short_id,
            title: summary.title,
            culprit: summary.culprit.unwrap_or_default(),
            count: summary.count,
            level: summary.level.unwrap_or_default(),
            first_seen: summary.first_seen,
            last_seen: summary.last_seen,
            stack_trace,
            tags,
        })
    }
}

#[async_trait]
impl IssueSource for SentryClient {
    #[instrument(skip(self), fields(org = %self.org, projects = self.projects.len()))]
    async fn fetch_unresolved(&self) -> AgentFixResult<Vec<ExternalIssue>> {
        let per_project = try_join_all(
            self.projects
                .iter()
                .map(|project| self.list_project_issues(project)),
        )
        .await?;

        let summaries: Vec<IssueSummary> = per_project.into_iter().flatten().collect();
        let mut issues = try_join_all(summaries.into_iter().map(|s| self.enrich(s))).await?;

        issues.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));

        info!(issues = issues.len(), "Fetched unresolved Sentry issues");
        Ok(issues)
    }
}

impl std::fmt::Debug for SentryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryClient")
            .field("base_url", &self.base_url)
            .field("org", &self.org)
            .field("projects", &self.projects)
            .field("max_issues", &self.max_issues)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "sentry_tests.rs"]
mod tests;
