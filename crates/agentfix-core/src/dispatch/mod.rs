//! # Dispatch Orchestrator
//!
//! Turns an [`AutoFixEvent`] into a remediation request. Findings are
//! deduplicated, rendered into a fixed-structure prompt and handed to a
//! [`RemediationProvider`]. The provider's verdict comes back as a
//! [`DispatchResult`]; a failed dispatch is an observed outcome, not an error.
//!
//! Events come from two places:
//! - [`review::ReviewDispatcher`] for pull request reviews that requested changes
//! - [`contexts::ContextDispatcher`] for Sentry issues selected by the reconciler

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::findings::{dedupe, Finding};

pub mod contexts;
pub mod provider;
pub mod review;

pub use contexts::{
    build_dispatch_contexts, BatchSummary, ContextDispatcher, ContextOutcome, DispatchContext,
};
pub use provider::{
    provider_from_config, ChatCompletionsProvider, RemediationProvider, UnconfiguredProvider,
};
pub use review::{ReviewDispatcher, ReviewSettings};

/// Message returned by a dry run.
pub const DRY_RUN_MESSAGE: &str = "Dry-run only. Dispatch skipped.";

// ============================================================================
// Events and Results
// ============================================================================

/// Where an auto-fix request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoFixSource {
    /// A pull request review that requested changes
    #[serde(alias = "greptile")]
    Review,
    /// A Sentry issue selected by the reconciler
    Sentry,
    /// Hand-written event file
    Manual,
}

/// A request to remediate a set of findings on one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixEvent {
    pub source: AutoFixSource,
    pub repository: String,
    pub target_branch: String,
    pub issue_ref: String,
    pub findings: Vec<Finding>,
}

/// Verdict of the remediation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub ok: bool,
    pub provider: String,
    pub model: String,
    /// HTTP status of the provider reply, 0 when no reply arrived
    pub http_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_id: Option<String>,
    pub message: String,
}

/// Rendered prompt of a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunResult {
    pub ok: bool,
    pub message: String,
    pub prompt: String,
}

/// Result of [`Orchestrator::run_auto_fix`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DispatchOutcome {
    Dispatched(DispatchResult),
    DryRun(DryRunResult),
}

impl DispatchOutcome {
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Dispatched(result) => result.ok,
            Self::DryRun(result) => result.ok,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Dispatched(result) => &result.message,
            Self::DryRun(result) => &result.message,
        }
    }

    /// The provider's result, unless this was a dry run.
    pub fn dispatch_result(&self) -> Option<&DispatchResult> {
        match self {
            Self::Dispatched(result) => Some(result),
            Self::DryRun(_) => None,
        }
    }
}

// ============================================================================
// Prompt
// ============================================================================

fn render_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .enumerate()
        .map(|(index, finding)| {
            let line = finding
                .line
                .map(|line| format!(":{}", line))
                .unwrap_or_default();
            format!("{}. {}{} -> {}", index + 1, finding.file, line, finding.summary)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remediation prompt for `event`.
///
/// The findings are rendered as given; deduplicate them first.
pub fn render_prompt(event: &AutoFixEvent) -> String {
    [
        format!(
            "You are AgentFix running automated remediation for repository {}.",
            event.repository
        ),
        format!("Target branch: {}", event.target_branch),
        format!("Issue reference: {}", event.issue_ref),
        String::new(),
        "Required workflow:".to_string(),
        "1) Sync latest branch state.".to_string(),
        "2) Reproduce the issue with a test first.".to_string(),
        "3) Implement minimal root-cause fix.".to_string(),
        "4) Run project tests and type checks.".to_string(),
        "5) Commit with scoped message and open draft PR.".to_string(),
        String::new(),
        "Findings:".to_string(),
        render_findings(&event.findings),
        String::new(),
        "Do not broaden scope beyond listed findings unless required for safety.".to_string(),
    ]
    .join("\n")
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Deduplicates, renders and dispatches auto-fix events.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn RemediationProvider>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn RemediationProvider>) -> Self {
        Self { provider }
    }

    /// Run one auto-fix event.
    ///
    /// With `dry_run` the prompt is rendered and returned without contacting
    /// the provider.
    #[instrument(skip(self, event), fields(issue_ref = %event.issue_ref, source = ?event.source))]
    pub async fn run_auto_fix(&self, event: AutoFixEvent, dry_run: bool) -> DispatchOutcome {
        let received = event.findings.len();
        let event = AutoFixEvent {
            findings: dedupe(event.findings),
            ..event
        };
        let prompt = render_prompt(&event);

        info!(
            findings = event.findings.len(),
            duplicates = received - event.findings.len(),
            dry_run,
            "Prepared remediation prompt"
        );

        if dry_run {
            return DispatchOutcome::DryRun(DryRunResult {
                ok: true,
                message: DRY_RUN_MESSAGE.to_string(),
                prompt,
            });
        }

        DispatchOutcome::Dispatched(self.provider.dispatch(&prompt).await)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
