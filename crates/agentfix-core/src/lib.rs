//! # AgentFix Core
//!
//! Domain logic for AgentFix, the automated remediation service:
//!
//! - [`findings`]: finding extraction, normalization and deduplication
//! - [`sentry`]: the unresolved-issue source
//! - [`reconciler`]: the tracked-issue state machine and its event log
//! - [`dispatch`]: prompt rendering, the remediation provider and dispatch contexts
//! - [`pipeline`]: the staged fetch, reconcile and dispatch run
//! - [`handoff`]: JSON files passed between run stages
//!
//! Collaborators sit behind traits ([`sentry::IssueSource`],
//! [`reconciler::IssueTracker`], [`reconciler::EventLog`],
//! [`dispatch::RemediationProvider`]) and are injected at construction time.
//!
//! ## Usage
//!
//! ```rust
//! use agentfix_core::findings::{dedupe, Finding};
//!
//! let findings = vec![
//!     Finding::new("src/a.ts", Some(3), "Missing tenant check"),
//!     Finding::new("SRC/a.ts", Some(3), "missing  tenant check"),
//! ];
//! assert_eq!(dedupe(findings).len(), 1);
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod findings;
pub mod handoff;
pub mod pipeline;
pub mod reconciler;
pub mod sentry;

pub use config::{AgentFixConfig, ConfigError, Requirement, Secret};
pub use dispatch::{
    AutoFixEvent, AutoFixSource, DispatchOutcome, DispatchResult, Orchestrator,
    RemediationProvider,
};
pub use error::{AgentFixError, AgentFixResult};
pub use findings::Finding;
pub use pipeline::{Pipeline, PipelineSettings, PipelineSummary};
pub use reconciler::{Reconciler, ReconcilerSettings, TrackingState};
pub use sentry::{ExternalIssue, IssueSource, SentryClient};
