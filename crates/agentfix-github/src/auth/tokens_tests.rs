//! Tests for installation token exchange.

use super::*;
use chrono::Duration as ChronoDuration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Generator
// ============================================================================

struct StaticJwtGenerator;

#[async_trait::async_trait]
impl JwtGenerator for StaticJwtGenerator {
    async fn generate_jwt(&self, app_id: GitHubAppId) -> Result<JsonWebToken, AuthError> {
        let now = Utc::now();
        Ok(JsonWebToken::new(
            "static.jwt.token".to_string(),
            app_id,
            now,
            now + ChronoDuration::minutes(9),
        ))
    }
}

fn authenticator(server: &MockServer) -> AppAuthenticator {
    AppAuthenticator::with_generator(
        GitHubAppId::new(123),
        Arc::new(StaticJwtGenerator),
        server.uri(),
    )
    .unwrap()
}

mod exchange {
    use super::*;

    /// Given: The App API issues a token for installation 42
    /// When: installation_token() is called
    /// Then: The request carries the bearer assertion and GitHub headers
    /// And: The returned token exposes the issued value and expiry
    #[tokio::test]
    async fn test_exchange_returns_installation_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/42/access_tokens"))
            .and(header("Authorization", "Bearer static.jwt.token"))
            .and(header("Accept", "application/vnd.github+json"))
            .and(header_exists("User-Agent"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "token": "ghs_installation",
                "expires_at": "2030-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = authenticator(&server)
            .installation_token(InstallationId::new(42))
            .await
            .unwrap();

        assert_eq!(token.token(), "ghs_installation");
        assert_eq!(token.installation_id(), InstallationId::new(42));
        assert_eq!(token.expires_at().to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_unknown_installation_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/7/access_tokens"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let result = authenticator(&server)
            .installation_token(InstallationId::new(7))
            .await;

        assert!(matches!(
            result,
            Err(AuthError::InstallationNotFound { installation_id }) if installation_id.as_u64() == 7
        ));
    }

    #[tokio::test]
    async fn test_rejected_assertion_maps_to_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = authenticator(&server)
            .installation_token(InstallationId::new(1))
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    /// Given: The App API fails with a 500 and a long body
    /// When: The exchange runs
    /// Then: The error carries the status and a truncated body, with no retry
    #[tokio::test]
    async fn test_server_error_is_fatal_and_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("e".repeat(1000)))
            .expect(1)
            .mount(&server)
            .await;

        let result = authenticator(&server)
            .installation_token(InstallationId::new(1))
            .await;

        match result {
            Err(AuthError::GitHubApiError {
                status, message, ..
            }) => {
                assert_eq!(status, 500);
                assert_eq!(message.len(), 300);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/installations/5/access_tokens"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "token": "ghs_x",
                "expires_at": "2030-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let auth = AppAuthenticator::with_generator(
            GitHubAppId::new(1),
            Arc::new(StaticJwtGenerator),
            format!("{}/", server.uri()),
        )
        .unwrap();

        assert!(auth.installation_token(InstallationId::new(5)).await.is_ok());
    }
}
