//! Tests for review-triggered dispatch.

use super::*;
use crate::dispatch::provider::MockRemediationProvider;
use crate::dispatch::DispatchResult;
use crate::error::AgentFixError;
use agentfix_github::auth::InstallationToken;
use agentfix_github::AuthError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Mutex;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ============================================================================
// Test Doubles
// ============================================================================

/// Hands out tokens with a fixed lifetime and records requested installations.
struct StaticAuth {
    lifetime: Duration,
    requested: Mutex<Vec<InstallationId>>,
}

impl StaticAuth {
    fn valid_for(lifetime: Duration) -> Arc<Self> {
        Arc::new(Self {
            lifetime,
            requested: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl AuthenticationProvider for StaticAuth {
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        self.requested.lock().unwrap().push(installation_id);
        Ok(InstallationToken::new(
            "ghs_review".to_string(),
            installation_id,
            Utc::now() + self.lifetime,
        ))
    }
}

fn accepted() -> DispatchResult {
    DispatchResult {
        ok: true,
        provider: "openclaw".to_string(),
        model: "m".to_string(),
        http_code: 200,
        dispatch_id: Some("chatcmpl-7".to_string()),
        message: "Dispatch accepted".to_string(),
    }
}

fn settings(server: &MockServer) -> ReviewSettings {
    ReviewSettings {
        review_authors: vec!["greptile[bot]".to_string()],
        default_installation: None,
        client_config: ClientConfig::default().with_github_api_url(server.uri()),
        work_budget: Duration::seconds(90),
    }
}

fn review(installation: Option<u64>) -> ChangesRequestedReview {
    ChangesRequestedReview {
        repository: "acme/widgets".to_string(),
        pull_request_number: 12,
        head_ref: "feature/login".to_string(),
        installation_id: installation.map(InstallationId::new),
        reviewer: Some("greptile[bot]".to_string()),
    }
}

async fn mount_review_comments(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/12/comments"))
        .and(header("Authorization", "token ghs_review"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "path": "src/login.ts", "line": 20, "body": "Missing tenant check", "user": {"login": "greptile[bot]"}},
            {"id": 2, "path": "src/login.ts", "line": 20, "body": "missing  tenant CHECK", "user": {"login": "greptile[bot]"}},
            {"id": 3, "path": "src/other.ts", "line": 1, "body": "nit", "user": {"login": "octocat"}}
        ])))
        .mount(server)
        .await;
}

fn provider_expecting_prompt() -> MockRemediationProvider {
    let mut provider = MockRemediationProvider::new();
    provider
        .expect_dispatch()
        .withf(|prompt: &str| {
            prompt.contains("Target branch: feature/login")
                && prompt.contains("Issue reference: PR-12")
                && prompt.contains("1. src/login.ts:20 -> Missing tenant check")
                && !prompt.contains("src/other.ts")
        })
        .times(1)
        .returning(|_| accepted());
    provider
}

// ============================================================================
// Tests
// ============================================================================

mod handling {
    use super::*;

    /// Given: A changes-requested review with inline comments from an allowed reviewer
    /// When: The review is handled
    /// Then: The deduplicated findings are dispatched against the head branch
    /// And: A result comment is posted on the pull request
    #[tokio::test]
    async fn test_review_is_dispatched_and_result_posted() {
        let server = MockServer::start().await;
        mount_review_comments(&server).await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/12/comments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 99, "body": "ok", "created_at": "2026-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = StaticAuth::valid_for(Duration::minutes(60));
        let dispatcher = ReviewDispatcher::new(
            auth.clone(),
            Orchestrator::new(Arc::new(provider_expecting_prompt())),
            settings(&server),
        );

        let outcome = dispatcher.handle(&review(Some(42))).await.unwrap();

        assert!(outcome.is_ok());
        assert_eq!(*auth.requested.lock().unwrap(), vec![InstallationId::new(42)]);

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let posted = requests
            .iter()
            .find(|r| r.method.as_str() == "POST")
            .map(|r| String::from_utf8_lossy(&r.body).to_string())
            .unwrap();
        assert!(posted.contains("Dispatch result: ok"));
        assert!(posted.contains("Dispatch id: chatcmpl-7"));
    }

    #[tokio::test]
    async fn test_configured_installation_is_used_as_fallback() {
        let server = MockServer::start().await;
        mount_review_comments(&server).await;

        let auth = StaticAuth::valid_for(Duration::minutes(60));
        let mut settings = settings(&server);
        settings.default_installation = Some(InstallationId::new(7));
        let dispatcher = ReviewDispatcher::new(
            auth.clone(),
            Orchestrator::new(Arc::new(provider_expecting_prompt())),
            settings,
        );

        dispatcher.handle(&review(None)).await.unwrap();
        assert_eq!(*auth.requested.lock().unwrap(), vec![InstallationId::new(7)]);
    }

    #[tokio::test]
    async fn test_result_comment_failure_is_not_fatal() {
        let server = MockServer::start().await;
        mount_review_comments(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let dispatcher = ReviewDispatcher::new(
            StaticAuth::valid_for(Duration::minutes(60)),
            Orchestrator::new(Arc::new(provider_expecting_prompt())),
            settings(&server),
        );

        assert!(dispatcher.handle(&review(Some(42))).await.is_ok());
    }
}

mod failures {
    use super::*;

    fn idle_provider() -> MockRemediationProvider {
        let mut provider = MockRemediationProvider::new();
        provider.expect_dispatch().never();
        provider
    }

    #[tokio::test]
    async fn test_missing_installation_is_configuration_error() {
        let server = MockServer::start().await;
        let dispatcher = ReviewDispatcher::new(
            StaticAuth::valid_for(Duration::minutes(60)),
            Orchestrator::new(Arc::new(idle_provider())),
            settings(&server),
        );

        let result = dispatcher.handle(&review(None)).await;
        assert!(matches!(result, Err(AgentFixError::Configuration(_))));
    }

    /// Given: An installation token that expires before the work budget elapses
    /// When: The review is handled
    /// Then: Handling fails before any tracker call
    #[tokio::test]
    async fn test_short_lived_token_is_rejected() {
        let server = MockServer::start().await;
        let dispatcher = ReviewDispatcher::new(
            StaticAuth::valid_for(Duration::seconds(30)),
            Orchestrator::new(Arc::new(idle_provider())),
            settings(&server),
        );

        let result = dispatcher.handle(&review(Some(42))).await;

        assert!(matches!(
            result,
            Err(AgentFixError::Authentication(AuthError::TokenExpired))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_comment_listing_failure_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let dispatcher = ReviewDispatcher::new(
            StaticAuth::valid_for(Duration::minutes(60)),
            Orchestrator::new(Arc::new(idle_provider())),
            settings(&server),
        );

        let result = dispatcher.handle(&review(Some(42))).await;
        assert_eq!(result.unwrap_err().upstream_status(), Some(404));
    }
}

mod comments {
    use super::*;

    #[test]
    fn test_failed_outcome_comment_has_reason() {
        let outcome = DispatchOutcome::Dispatched(DispatchResult {
            ok: false,
            dispatch_id: None,
            http_code: 0,
            message: "Dispatch timed out after 30s".to_string(),
            ..accepted()
        });
        let comment = review_comment("PR-12", 2, &outcome);

        assert!(comment.starts_with(REVIEW_MARKER));
        assert!(comment.contains("Findings: 2"));
        assert!(comment.contains("Dispatch result: failed"));
        assert!(comment.ends_with("Reason: Dispatch timed out after 30s"));
        assert!(!comment.contains("Dispatch id"));
    }
}
