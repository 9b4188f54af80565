//! Webhook event payloads and classification.
//!
//! Only two deliveries matter: the `ping` liveness probe and a submitted
//! `pull_request_review` whose state is `changes_requested`. Everything else
//! is acknowledged and ignored.

use serde::Deserialize;

use crate::auth::InstallationId;

/// Header carrying the event type.
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the HMAC signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header carrying the delivery id.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Review state that triggers remediation.
pub const CHANGES_REQUESTED: &str = "changes_requested";

/// A review that requested changes on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesRequestedReview {
    /// `owner/repo` of the pull request.
    pub repository: String,
    /// Pull request number.
    pub pull_request_number: u64,
    /// Head branch of the pull request.
    pub head_ref: String,
    /// Installation that delivered the event, if present.
    pub installation_id: Option<InstallationId>,
    /// Login of the reviewer.
    pub reviewer: Option<String>,
}

/// What an inbound delivery means for AgentFix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Liveness probe sent when the hook is configured.
    Ping,
    /// The only actionable combination.
    ChangesRequested(ChangesRequestedReview),
    /// Acknowledged and dropped.
    Ignored { reason: String },
}

impl WebhookEvent {
    /// Classify a parsed delivery.
    ///
    /// # Errors
    ///
    /// Returns the serde error if a `pull_request_review` payload does not
    /// have the expected object shape.
    pub fn classify(
        event_type: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        match event_type {
            Some("ping") => Ok(Self::Ping),
            Some("pull_request_review") => {
                let review = ReviewPayload::deserialize(payload)?;
                Ok(review.into_event())
            }
            Some(other) => Ok(Self::Ignored {
                reason: format!("event type '{}' is not handled", other),
            }),
            None => Ok(Self::Ignored {
                reason: "missing event type header".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewPayload {
    action: Option<String>,
    review: Option<ReviewBody>,
    pull_request: Option<PullRequestBody>,
    repository: Option<RepositoryBody>,
    installation: Option<InstallationBody>,
}

#[derive(Debug, Deserialize)]
struct ReviewBody {
    state: Option<String>,
    user: Option<AccountBody>,
}

#[derive(Debug, Deserialize)]
struct AccountBody {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestBody {
    number: u64,
    head: Option<BranchBody>,
}

#[derive(Debug, Deserialize)]
struct BranchBody {
    #[serde(rename = "ref")]
    ref_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryBody {
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstallationBody {
    id: u64,
}

impl ReviewPayload {
    fn into_event(self) -> WebhookEvent {
        if self.action.as_deref() != Some("submitted") {
            return WebhookEvent::Ignored {
                reason: "review action is not 'submitted'".to_string(),
            };
        }

        let Some(review) = self.review else {
            return ignored("missing review");
        };
        if !review
            .state
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(CHANGES_REQUESTED))
        {
            return ignored("review state is not 'changes_requested'");
        }

        let Some(repository) = self.repository.and_then(|r| r.full_name) else {
            return ignored("missing repository.full_name");
        };
        let Some(pull_request) = self.pull_request else {
            return ignored("missing pull_request");
        };
        let Some(head_ref) = pull_request.head.and_then(|h| h.ref_name) else {
            return ignored("missing pull_request.head.ref");
        };

        WebhookEvent::ChangesRequested(ChangesRequestedReview {
            repository,
            pull_request_number: pull_request.number,
            head_ref,
            installation_id: self.installation.map(|i| InstallationId::new(i.id)),
            reviewer: review.user.map(|u| u.login),
        })
    }
}

fn ignored(reason: &str) -> WebhookEvent {
    WebhookEvent::Ignored {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
