//! # Configuration
//!
//! One explicit configuration structure, loaded once and validated centrally
//! before any component is built. Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `.agentfix.{yml,yaml,json}` in the working directory (optional)
//! 3. An explicit file passed with `--config`
//! 4. Environment variables prefixed `AGENTFIX__`, nested with `__`
//!    (for example `AGENTFIX__GITHUB_APP__PRIVATE_KEY`)
//!
//! Each run declares the [`Requirement`]s it needs; [`AgentFixConfig::validate`]
//! reports every missing key at once.

use agentfix_github::{GitHubAppId, PrivateKey, RepositoryName};
use serde::{Deserialize, Serialize, Serializer};
use std::path::Path;
use thiserror::Error;
use zeroize::Zeroize;

/// Base name of the optional configuration file in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".agentfix";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "AGENTFIX";

// ============================================================================
// Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {}", keys.join(", "))]
    Missing { keys: Vec<String> },

    #[error("invalid configuration for '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("failed to load configuration: {message}")]
    Load { message: String },
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    Missing(String),
    Invalid { key: String, message: String },
}

impl std::fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "{} is required", key),
            Self::Invalid { key, message } => write!(f, "{}: {}", key, message),
        }
    }
}

/// What a particular run needs from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Inbound webhook verification.
    Webhook,
    /// GitHub App assertion minting.
    AppAuth,
    /// Reading and writing tracked issues.
    Tracker,
    /// Reading the Sentry issue source.
    IssueSource,
    /// Calling the remediation provider.
    Remediation,
}

impl Requirement {
    /// Every requirement, in validation order.
    pub const ALL: [Requirement; 5] = [
        Requirement::Webhook,
        Requirement::AppAuth,
        Requirement::Tracker,
        Requirement::IssueSource,
        Requirement::Remediation,
    ];
}

// ============================================================================
// Secret values
// ============================================================================

/// A configuration value that must never be printed.
///
/// `Debug` and `Serialize` redact the value; memory is wiped on drop.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The underlying value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the value is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<REDACTED>)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<REDACTED>")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

fn present(secret: &Option<Secret>) -> Option<&Secret> {
    secret.as_ref().filter(|s| !s.is_blank())
}

fn present_str(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Sections
// ============================================================================

/// Complete AgentFix configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentFixConfig {
    pub github_app: GitHubAppConfig,
    pub tracker: TrackerConfig,
    pub sentry: SentryConfig,
    pub reconciler: ReconcilerConfig,
    pub dispatch: DispatchConfig,
    pub remediation: RemediationConfig,
    pub auto_fix: AutoFixConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// GitHub App identity and webhook secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubAppConfig {
    /// Numeric App ID
    pub app_id: Option<String>,
    /// PEM private key; literal `\n` sequences are accepted
    pub private_key: Option<Secret>,
    /// Shared secret for webhook signatures
    pub webhook_secret: Option<Secret>,
    /// Installation used when a payload does not name one
    pub installation_id: Option<u64>,
    /// REST API base URL
    pub api_base_url: String,
    /// Reviewer logins whose inline comments become findings
    pub review_authors: Vec<String>,
}

impl Default for GitHubAppConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            private_key: None,
            webhook_secret: None,
            installation_id: None,
            api_base_url: agentfix_github::client::DEFAULT_API_URL.to_string(),
            review_authors: vec!["greptile".to_string(), "greptile[bot]".to_string()],
        }
    }
}

impl GitHubAppConfig {
    /// Parsed App ID and private key.
    ///
    /// # Errors
    ///
    /// `Missing` when either value is absent, `Invalid` when it does not parse.
    pub fn credentials(&self) -> Result<(GitHubAppId, PrivateKey), ConfigError> {
        let mut missing = Vec::new();
        if present_str(&self.app_id).is_none() {
            missing.push("github_app.app_id".to_string());
        }
        if present(&self.private_key).is_none() {
            missing.push("github_app.private_key".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing { keys: missing });
        }

        let app_id = present_str(&self.app_id)
            .unwrap_or_default()
            .parse::<GitHubAppId>()
            .map_err(|e| ConfigError::Invalid {
                key: "github_app.app_id".to_string(),
                message: e.to_string(),
            })?;

        let pem = present(&self.private_key)
            .map(Secret::expose)
            .unwrap_or_default();
        let key = PrivateKey::from_pem(pem).map_err(|e| ConfigError::Invalid {
            key: "github_app.private_key".to_string(),
            message: e.to_string(),
        })?;

        Ok((app_id, key))
    }
}

/// Tracker repository and listing behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// `owner/repo` holding tracked issues
    pub repository: Option<String>,
    /// Pre-issued token; when absent an installation token is minted
    pub token: Option<Secret>,
    /// Label carried by every tracked issue
    pub label: String,
    /// Titles starting with this are never treated as tracked issues
    pub discussion_prefix: String,
    /// Items per page on list endpoints
    pub page_size: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            repository: None,
            token: None,
            label: "sentry".to_string(),
            discussion_prefix: "[Discussion]".to_string(),
            page_size: agentfix_github::client::DEFAULT_PAGE_SIZE,
        }
    }
}

impl TrackerConfig {
    /// Parsed tracker repository.
    pub fn repository_name(&self) -> Result<RepositoryName, ConfigError> {
        let raw = present_str(&self.repository).ok_or_else(|| ConfigError::Missing {
            keys: vec!["tracker.repository".to_string()],
        })?;
        raw.parse().map_err(|e: agentfix_github::ValidationError| ConfigError::Invalid {
            key: "tracker.repository".to_string(),
            message: e.to_string(),
        })
    }

    /// The configured token, if any.
    pub fn token(&self) -> Option<&Secret> {
        present(&self.token)
    }
}

/// Sentry issue source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    /// Sentry base URL
    pub url: String,
    /// API bearer token
    pub auth_token: Option<Secret>,
    /// Organization slug
    pub org: Option<String>,
    /// Project slugs to read
    pub projects: Vec<String>,
    /// Issues requested per project
    pub max_issues: u32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            url: "https://sentry.io".to_string(),
            auth_token: None,
            org: None,
            projects: Vec::new(),
            max_issues: 5,
        }
    }
}

/// Reconciler policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Hours between requeues of an open tracked issue
    pub cooldown_hours: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            cooldown_hours: 24.0,
        }
    }
}

/// Dispatch context selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on contexts dispatched per run
    pub max_fixes: usize,
    /// Branch remediation works against
    pub target_branch: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_fixes: 3,
            target_branch: "dev".to_string(),
        }
    }
}

/// Remediation provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Name reported in dispatch results
    pub provider: String,
    /// Base URL of the chat-completions endpoint
    pub base_url: Option<String>,
    /// Bearer token
    pub token: Option<Secret>,
    /// Model requested
    pub model: String,
    /// Hard wall-clock limit per dispatch
    pub timeout_seconds: u64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            provider: "openclaw".to_string(),
            base_url: None,
            token: None,
            model: "openai-codex/gpt-5.3-codex".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Automatic remediation switch for the webhook path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoFixConfig {
    /// When false, actionable reviews are acknowledged without dispatch
    pub enabled: bool,
}

impl Default for AutoFixConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            shutdown_timeout_seconds: 30,
            max_body_size: 5 * 1024 * 1024,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

// ============================================================================
// Loading and validation
// ============================================================================

impl AgentFixConfig {
    /// Load configuration from defaults, files and the environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::Load` if a source cannot be read or deserialized.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Some(path) = explicit_path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sentry.projects")
                    .with_list_parse_key("github_app.review_authors"),
            )
            .build()
            .map_err(|e| ConfigError::Load {
                message: e.to_string(),
            })?;

        settings.try_deserialize().map_err(|e| ConfigError::Load {
            message: e.to_string(),
        })
    }

    /// Validate the configuration for a run needing `requirements`.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` listing every absent key, otherwise the first
    /// `ConfigError::Invalid`.
    pub fn validate(&self, requirements: &[Requirement]) -> Result<(), ConfigError> {
        let problems = self.problems(requirements);

        let missing: Vec<String> = problems
            .iter()
            .filter_map(|p| match p {
                ConfigProblem::Missing(key) => Some(key.clone()),
                ConfigProblem::Invalid { .. } => None,
            })
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing { keys: missing });
        }

        match problems.into_iter().next() {
            Some(ConfigProblem::Invalid { key, message }) => {
                Err(ConfigError::Invalid { key, message })
            }
            _ => Ok(()),
        }
    }

    /// Every problem found for `requirements`, in a stable order.
    pub fn problems(&self, requirements: &[Requirement]) -> Vec<ConfigProblem> {
        let mut problems = Vec::new();

        for requirement in Requirement::ALL {
            if !requirements.contains(&requirement) {
                continue;
            }
            match requirement {
                Requirement::Webhook => self.check_webhook(&mut problems),
                Requirement::AppAuth => self.check_app_auth(&mut problems),
                Requirement::Tracker => self.check_tracker(&mut problems),
                Requirement::IssueSource => self.check_issue_source(&mut problems),
                Requirement::Remediation => self.check_remediation(&mut problems),
            }
        }

        dedupe_problems(problems)
    }

    fn check_webhook(&self, problems: &mut Vec<ConfigProblem>) {
        if present(&self.github_app.webhook_secret).is_none() {
            problems.push(ConfigProblem::Missing("github_app.webhook_secret".to_string()));
        }
    }

    fn check_app_auth(&self, problems: &mut Vec<ConfigProblem>) {
        check_url(&self.github_app.api_base_url, "github_app.api_base_url", problems);
        match self.github_app.credentials() {
            Ok(_) => {}
            Err(ConfigError::Missing { keys }) => {
                problems.extend(keys.into_iter().map(ConfigProblem::Missing))
            }
            Err(ConfigError::Invalid { key, message }) => {
                problems.push(ConfigProblem::Invalid { key, message })
            }
            Err(ConfigError::Load { message }) => problems.push(ConfigProblem::Invalid {
                key: "github_app".to_string(),
                message,
            }),
        }
    }

    fn check_tracker(&self, problems: &mut Vec<ConfigProblem>) {
        match self.tracker.repository_name() {
            Ok(_) => {}
            Err(ConfigError::Invalid { key, message }) => {
                problems.push(ConfigProblem::Invalid { key, message })
            }
            Err(_) => problems.push(ConfigProblem::Missing("tracker.repository".to_string())),
        }

        if self.tracker.label.trim().is_empty() {
            problems.push(ConfigProblem::Missing("tracker.label".to_string()));
        }
        if self.tracker.page_size == 0 || self.tracker.page_size > 100 {
            problems.push(ConfigProblem::Invalid {
                key: "tracker.page_size".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }

        // Without a pre-issued token the tracker needs an App installation.
        if self.tracker.token().is_none() {
            self.check_app_auth(problems);
            if self.github_app.installation_id.is_none() {
                problems.push(ConfigProblem::Missing(
                    "tracker.token or github_app.installation_id".to_string(),
                ));
            }
        }

        if !self.reconciler.cooldown_hours.is_finite() || self.reconciler.cooldown_hours < 0.0 {
            problems.push(ConfigProblem::Invalid {
                key: "reconciler.cooldown_hours".to_string(),
                message: "must be a non-negative number".to_string(),
            });
        }
    }

    fn check_issue_source(&self, problems: &mut Vec<ConfigProblem>) {
        check_url(&self.sentry.url, "sentry.url", problems);
        if present(&self.sentry.auth_token).is_none() {
            problems.push(ConfigProblem::Missing("sentry.auth_token".to_string()));
        }
        if present_str(&self.sentry.org).is_none() {
            problems.push(ConfigProblem::Missing("sentry.org".to_string()));
        }
        if self.sentry.projects.iter().all(|p| p.trim().is_empty()) {
            problems.push(ConfigProblem::Missing("sentry.projects".to_string()));
        }
    }

    fn check_remediation(&self, problems: &mut Vec<ConfigProblem>) {
        match present_str(&self.remediation.base_url) {
            Some(base) => check_url(base, "remediation.base_url", problems),
            None => problems.push(ConfigProblem::Missing("remediation.base_url".to_string())),
        }
        if present(&self.remediation.token).is_none() {
            problems.push(ConfigProblem::Missing("remediation.token".to_string()));
        }
        if self.remediation.model.trim().is_empty() {
            problems.push(ConfigProblem::Missing("remediation.model".to_string()));
        }
        if self.remediation.timeout_seconds == 0 {
            problems.push(ConfigProblem::Invalid {
                key: "remediation.timeout_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
    }
}

fn check_url(value: &str, key: &str, problems: &mut Vec<ConfigProblem>) {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => problems.push(ConfigProblem::Invalid {
            key: key.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        }),
        Err(e) => problems.push(ConfigProblem::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn dedupe_problems(problems: Vec<ConfigProblem>) -> Vec<ConfigProblem> {
    let mut unique = Vec::with_capacity(problems.len());
    for problem in problems {
        if !unique.contains(&problem) {
            unique.push(problem);
        }
    }
    unique
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
