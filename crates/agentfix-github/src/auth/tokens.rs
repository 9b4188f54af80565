//! Installation token exchange.
//!
//! An [`AppAuthenticator`] mints a fresh assertion for every exchange and
//! trades it for an installation access token. Tokens are handed to the
//! caller and never stored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::auth::{
    AuthenticationProvider, GitHubAppId, InstallationId, InstallationToken, JsonWebToken,
    JwtGenerator, PrivateKey, RS256JwtGenerator,
};
use crate::client::{GITHUB_ACCEPT, USER_AGENT};
use crate::error::{truncate_body, AuthError};

/// Wire shape of `POST /app/installations/{id}/access_tokens`.
#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// GitHub App authenticator that exchanges assertions for installation tokens.
pub struct AppAuthenticator {
    app_id: GitHubAppId,
    generator: Arc<dyn JwtGenerator>,
    http_client: reqwest::Client,
    api_base_url: String,
}

impl AppAuthenticator {
    /// Create an authenticator that signs assertions with `private_key`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NetworkError` if the HTTP client cannot be built.
    pub fn new(
        app_id: GitHubAppId,
        private_key: PrivateKey,
        api_base_url: impl Into<String>,
    ) -> Result<Self, AuthError> {
        Self::with_generator(
            app_id,
            Arc::new(RS256JwtGenerator::new(private_key)),
            api_base_url,
        )
    }

    /// Create an authenticator around an arbitrary assertion generator.
    pub fn with_generator(
        app_id: GitHubAppId,
        generator: Arc<dyn JwtGenerator>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        Ok(Self {
            app_id,
            generator,
            http_client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// The App this authenticator acts for.
    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    /// Exchange `jwt` for an installation access token.
    ///
    /// Any non-2xx response is fatal for this call; retrying is the caller's
    /// decision.
    ///
    /// # Errors
    ///
    /// - `InstallationNotFound` on HTTP 404
    /// - `InvalidCredentials` on HTTP 401
    /// - `GitHubApiError` for any other non-success status
    /// - `NetworkError` when the request cannot be sent
    #[instrument(skip(self, jwt), fields(installation_id = %installation_id))]
    pub async fn exchange_for_installation_token(
        &self,
        jwt: &JsonWebToken,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base_url, installation_id
        );

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", jwt.token()))
            .header("Accept", GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Installation token exchange rejected");
            return Err(match status.as_u16() {
                404 => AuthError::InstallationNotFound { installation_id },
                401 => AuthError::InvalidCredentials,
                code => AuthError::GitHubApiError {
                    status: code,
                    url,
                    message: truncate_body(&body),
                },
            });
        }

        let payload: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        debug!(expires_at = %payload.expires_at, "Installation token issued");

        Ok(InstallationToken::new(
            payload.token,
            installation_id,
            payload.expires_at,
        ))
    }
}

#[async_trait::async_trait]
impl AuthenticationProvider for AppAuthenticator {
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let jwt = self.generator.generate_jwt(self.app_id).await?;
        self.exchange_for_installation_token(&jwt, installation_id)
            .await
    }
}

impl std::fmt::Debug for AppAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppAuthenticator")
            .field("app_id", &self.app_id)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
