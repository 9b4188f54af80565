//! # AgentFix GitHub
//!
//! GitHub plumbing for AgentFix:
//! - GitHub App authentication: RS256 assertion minting and installation token exchange
//! - Webhook signature verification over raw request bytes
//! - A repository-scoped REST client for issues, comments and review comments
//!
//! # Examples
//!
//! ```rust
//! use agentfix_github::webhook::{sign_payload, verify_signature};
//!
//! let body = br#"{"zen":"Keep it logically awesome."}"#;
//! let signature = sign_payload(body, "secret").unwrap();
//! assert!(verify_signature(body, Some(&signature), "secret"));
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod webhook;

pub use auth::{
    build_assertion, AppAuthenticator, AuthenticationProvider, GitHubAppId, InstallationId,
    InstallationToken, JsonWebToken, JwtClaims, PrivateKey,
};
pub use client::{ClientConfig, RepositoryClient, RepositoryName};
pub use error::{ApiError, AuthError, ValidationError};
