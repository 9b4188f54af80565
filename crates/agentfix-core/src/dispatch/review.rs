//! Auto-fix for pull request reviews that requested changes.

use chrono::Duration;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use agentfix_github::auth::{AppAuthenticator, AuthenticationProvider, InstallationId};
use agentfix_github::client::{ClientConfig, RepositoryClient, RepositoryName};
use agentfix_github::webhook::ChangesRequestedReview;
use agentfix_github::{ApiError, ValidationError};

use crate::config::{AgentFixConfig, ConfigError};
use crate::dispatch::{provider_from_config, AutoFixEvent, AutoFixSource, DispatchOutcome, Orchestrator};
use crate::error::AgentFixResult;
use crate::findings::extract_findings_from_review_comments;
use crate::reconciler::github::client_config;

/// Hidden marker on review result comments.
pub const REVIEW_MARKER: &str = "<!-- agentfix-review-dispatch -->";

/// Settings for review-triggered dispatch.
#[derive(Debug, Clone)]
pub struct ReviewSettings {
    /// Reviewer logins whose inline comments become findings
    pub review_authors: Vec<String>,
    /// Installation used when the delivery carries none
    pub default_installation: Option<InstallationId>,
    pub client_config: ClientConfig,
    /// Installation tokens must outlive this much work
    pub work_budget: Duration,
}

impl ReviewSettings {
    pub fn from_config(config: &AgentFixConfig) -> Self {
        let timeout = i64::try_from(config.remediation.timeout_seconds).unwrap_or(i64::MAX / 2);
        Self {
            review_authors: config.github_app.review_authors.clone(),
            default_installation: config.github_app.installation_id.map(InstallationId::new),
            client_config: client_config(config),
            work_budget: Duration::seconds(timeout.saturating_add(60)),
        }
    }
}

/// Result comment posted on the reviewed pull request.
pub fn review_comment(issue_ref: &str, findings: usize, outcome: &DispatchOutcome) -> String {
    let mut lines = vec![
        REVIEW_MARKER.to_string(),
        String::new(),
        format!("AgentFix remediation for {}", issue_ref),
        format!("Findings: {}", findings),
        format!(
            "Dispatch result: {}",
            if outcome.is_ok() { "ok" } else { "failed" }
        ),
    ];
    if let Some(id) = outcome.dispatch_result().and_then(|r| r.dispatch_id.as_deref()) {
        lines.push(format!("Dispatch id: {}", id));
    }
    if !outcome.is_ok() {
        lines.push(format!("Reason: {}", outcome.message()));
    }
    lines.join("\n")
}

/// Turns a changes-requested review into a dispatch.
pub struct ReviewDispatcher {
    auth: Arc<dyn AuthenticationProvider>,
    orchestrator: Orchestrator,
    settings: ReviewSettings,
}

impl ReviewDispatcher {
    pub fn new(
        auth: Arc<dyn AuthenticationProvider>,
        orchestrator: Orchestrator,
        settings: ReviewSettings,
    ) -> Self {
        Self {
            auth,
            orchestrator,
            settings,
        }
    }

    /// Build a dispatcher authenticating as the configured GitHub App.
    pub fn from_config(config: &AgentFixConfig) -> AgentFixResult<Self> {
        let (app_id, private_key) = config.github_app.credentials()?;
        let auth = AppAuthenticator::new(app_id, private_key, config.github_app.api_base_url.clone())?;
        Ok(Self::new(
            Arc::new(auth),
            Orchestrator::new(provider_from_config(&config.remediation)),
            ReviewSettings::from_config(config),
        ))
    }

    /// Dispatch remediation for `review`.
    ///
    /// Posting the result comment is best-effort.
    ///
    /// # Errors
    ///
    /// - `Configuration` when no installation id is known
    /// - `Authentication` when no usable installation token can be minted
    /// - `Tracker` when the review comments cannot be listed
    #[instrument(
        skip(self, review),
        fields(repository = %review.repository, pull_request = review.pull_request_number)
    )]
    pub async fn handle(&self, review: &ChangesRequestedReview) -> AgentFixResult<DispatchOutcome> {
        let installation_id = review
            .installation_id
            .or(self.settings.default_installation)
            .ok_or_else(|| ConfigError::Missing {
                keys: vec!["github_app.installation_id".to_string()],
            })?;

        let repository: RepositoryName =
            review
                .repository
                .parse()
                .map_err(|e: ValidationError| ApiError::InvalidRequest {
                    message: e.to_string(),
                })?;

        let token = self.auth.installation_token(installation_id).await?;
        token.ensure_valid_for(self.settings.work_budget)?;

        let client = RepositoryClient::for_installation(
            self.settings.client_config.clone(),
            repository,
            &token,
        )?;
        let comments = client
            .list_pull_request_review_comments(review.pull_request_number)
            .await?;
        let findings =
            extract_findings_from_review_comments(&comments, &self.settings.review_authors);
        let finding_count = findings.len();

        let issue_ref = format!("PR-{}", review.pull_request_number);
        info!(
            comments = comments.len(),
            findings = finding_count,
            "Extracted review findings"
        );

        let event = AutoFixEvent {
            source: AutoFixSource::Review,
            repository: review.repository.clone(),
            target_branch: review.head_ref.clone(),
            issue_ref: issue_ref.clone(),
            findings,
        };
        let outcome = self.orchestrator.run_auto_fix(event, false).await;

        let body = review_comment(&issue_ref, finding_count, &outcome);
        if let Err(e) = client
            .create_issue_comment(review.pull_request_number, &body)
            .await
        {
            warn!(error = %e, "Failed to post review dispatch result");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
