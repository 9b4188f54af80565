//! Remediation providers.
//!
//! A provider takes a rendered prompt and reports whether the remediation
//! service accepted it. Providers never return errors: every failure,
//! including a timeout, becomes a [`DispatchResult`] with `ok: false`.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

use crate::config::RemediationConfig;
use crate::dispatch::DispatchResult;

/// Message reported for an accepted dispatch.
pub const DISPATCH_ACCEPTED: &str = "Dispatch accepted";

/// Remediation collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemediationProvider: Send + Sync {
    /// Submit `prompt` and report the outcome.
    async fn dispatch(&self, prompt: &str) -> DispatchResult;
}

// ============================================================================
// Chat Completions
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

/// Provider speaking the chat-completions protocol.
///
/// The whole request, including reading the response body, is bounded by
/// `timeout`.
pub struct ChatCompletionsProvider {
    http_client: reqwest::Client,
    endpoint: String,
    token: Zeroizing<String>,
    provider: String,
    model: String,
    timeout: Duration,
}

impl ChatCompletionsProvider {
    pub fn new(
        provider: impl Into<String>,
        base_url: &str,
        token: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            token: Zeroizing::new(token.into()),
            provider: provider.into(),
            model: model.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn result(&self, ok: bool, http_code: u16, dispatch_id: Option<String>, message: String) -> DispatchResult {
        DispatchResult {
            ok,
            provider: self.provider.clone(),
            model: self.model.clone(),
            http_code,
            dispatch_id,
            message,
        }
    }

    async fn send(&self, prompt: &str) -> Result<DispatchResult, reqwest::Error> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(self.token.as_str())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let dispatch_id = dispatch_id(&text);

        if !status.is_success() {
            warn!(status = status.as_u16(), "Remediation provider rejected dispatch");
            return Ok(self.result(
                false,
                status.as_u16(),
                dispatch_id,
                format!("Dispatch failed with HTTP {}", status.as_u16()),
            ));
        }

        Ok(self.result(true, status.as_u16(), dispatch_id, DISPATCH_ACCEPTED.to_string()))
    }
}

/// `id` or `response_id` from a JSON reply body, if either is a string.
fn dispatch_id(body: &str) -> Option<String> {
    let payload: serde_json::Value = serde_json::from_str(body).ok()?;
    ["id", "response_id"]
        .iter()
        .find_map(|key| payload.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl RemediationProvider for ChatCompletionsProvider {
    #[instrument(skip(self, prompt), fields(provider = %self.provider, model = %self.model))]
    async fn dispatch(&self, prompt: &str) -> DispatchResult {
        match tokio::time::timeout(self.timeout, self.send(prompt)).await {
            Ok(Ok(result)) => {
                info!(ok = result.ok, http_code = result.http_code, "Dispatch finished");
                result
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatch request failed");
                self.result(false, 0, None, e.to_string())
            }
            Err(_) => {
                warn!(timeout_seconds = self.timeout.as_secs(), "Dispatch timed out");
                self.result(
                    false,
                    0,
                    None,
                    format!("Dispatch timed out after {}s", self.timeout.as_secs()),
                )
            }
        }
    }
}

impl std::fmt::Debug for ChatCompletionsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsProvider")
            .field("endpoint", &self.endpoint)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Unconfigured
// ============================================================================

/// Stand-in used when the remediation section is incomplete.
///
/// Dry runs never reach it; real dispatches fail with the reason.
#[derive(Debug, Clone)]
pub struct UnconfiguredProvider {
    provider: String,
    model: String,
    reason: String,
}

#[async_trait]
impl RemediationProvider for UnconfiguredProvider {
    async fn dispatch(&self, _prompt: &str) -> DispatchResult {
        DispatchResult {
            ok: false,
            provider: self.provider.clone(),
            model: self.model.clone(),
            http_code: 0,
            dispatch_id: None,
            message: self.reason.clone(),
        }
    }
}

/// Provider described by the `remediation` configuration section.
pub fn provider_from_config(config: &RemediationConfig) -> Arc<dyn RemediationProvider> {
    let base_url = config.base_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let token = config.token.as_ref().filter(|t| !t.is_blank());

    match (base_url, token) {
        (Some(base_url), Some(token)) => Arc::new(ChatCompletionsProvider::new(
            &config.provider,
            base_url,
            token.expose(),
            &config.model,
            Duration::from_secs(config.timeout_seconds),
        )),
        (None, _) => Arc::new(UnconfiguredProvider {
            provider: config.provider.clone(),
            model: config.model.clone(),
            reason: "Missing remediation setting: remediation.base_url".to_string(),
        }),
        (_, None) => Arc::new(UnconfiguredProvider {
            provider: config.provider.clone(),
            model: config.model.clone(),
            reason: "Missing remediation setting: remediation.token".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
