//! Dispatch contexts for reconciled Sentry issues.
//!
//! A context pairs an auto-fix event with the tracked issue it came from, so
//! the dispatch verdict can be written back as a dispatch-marker comment.
//! That comment is what the reconciler's cooldown reads on the next run.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::dispatch::{AutoFixEvent, AutoFixSource, DispatchOutcome, Orchestrator};
use crate::findings::{infer_file_from_stack_trace, Finding};
use crate::reconciler::{IssueTracker, ReconciliationRecord, TrackingState, DISPATCH_MARKER};
use crate::sentry::ExternalIssue;

/// One reconciled Sentry issue ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchContext {
    pub gh_issue_number: u64,
    pub short_id: String,
    pub project: String,
    pub tracking_state: TrackingState,
    pub event: AutoFixEvent,
}

/// Finding summary for a Sentry issue.
pub fn context_summary(issue: &ExternalIssue) -> String {
    let short = if issue.short_id.is_empty() {
        &issue.id
    } else {
        &issue.short_id
    };
    let culprit = if issue.culprit.is_empty() {
        String::new()
    } else {
        format!(" Culprit: {}.", issue.culprit)
    };
    format!(
        "[{}] {}.{} Reproduce with a test and fix root cause.",
        short, issue.title, culprit
    )
}

/// Contexts for the first `max_fixes` records, in order.
pub fn build_dispatch_contexts(
    records: &[ReconciliationRecord],
    repository: &str,
    target_branch: &str,
    max_fixes: usize,
) -> Vec<DispatchContext> {
    records
        .iter()
        .take(max_fixes)
        .map(|record| DispatchContext {
            gh_issue_number: record.gh_issue_number,
            short_id: record.issue.short_id.clone(),
            project: record.issue.project.clone(),
            tracking_state: record.tracking_state,
            event: AutoFixEvent {
                source: AutoFixSource::Sentry,
                repository: repository.to_string(),
                target_branch: target_branch.to_string(),
                issue_ref: format!("Sentry-{}#{}", record.issue.short_id, record.gh_issue_number),
                findings: vec![Finding::new(
                    infer_file_from_stack_trace(&record.issue.stack_trace),
                    None,
                    context_summary(&record.issue),
                )],
            },
        })
        .collect()
}

/// Comment recording a dispatch attempt on the tracked issue.
pub fn dispatch_comment(context: &DispatchContext, outcome: &DispatchOutcome) -> String {
    let verdict = if outcome.is_ok() { "ok" } else { "failed" };
    let reason = if outcome.is_ok() {
        String::new()
    } else {
        format!("Reason: {}", outcome.message())
    };

    [
        DISPATCH_MARKER.to_string(),
        String::new(),
        format!("Sentry context: {} ({})", context.short_id, context.project),
        format!("Tracking state: {}", context.tracking_state),
        format!("Dispatch result: {}", verdict),
        reason,
    ]
    .join("\n")
}

// ============================================================================
// Batch Dispatch
// ============================================================================

/// Verdict for one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOutcome {
    pub short_id: String,
    pub issue_number: u64,
    pub ok: bool,
    pub message: String,
}

/// Verdicts for a batch of contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub outcomes: Vec<ContextOutcome>,
    pub failures: usize,
}

impl BatchSummary {
    pub fn push(&mut self, outcome: ContextOutcome) {
        if !outcome.ok {
            self.failures += 1;
        }
        self.outcomes.push(outcome);
    }

    /// True when every context dispatched successfully.
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }
}

/// Dispatches contexts and records each verdict on its tracked issue.
///
/// Without a tracker the verdicts are only returned.
pub struct ContextDispatcher {
    orchestrator: Orchestrator,
    tracker: Option<Arc<dyn IssueTracker>>,
}

impl ContextDispatcher {
    pub fn new(orchestrator: Orchestrator, tracker: Option<Arc<dyn IssueTracker>>) -> Self {
        Self {
            orchestrator,
            tracker,
        }
    }

    /// Dispatch one context.
    ///
    /// Failing to post the dispatch comment is logged and does not change the
    /// verdict.
    #[instrument(skip(self, context), fields(short_id = %context.short_id, issue_number = context.gh_issue_number))]
    pub async fn dispatch(&self, context: &DispatchContext) -> ContextOutcome {
        let outcome = self
            .orchestrator
            .run_auto_fix(context.event.clone(), false)
            .await;

        if let Some(tracker) = &self.tracker {
            let body = dispatch_comment(context, &outcome);
            if let Err(e) = tracker.post_comment(context.gh_issue_number, &body).await {
                warn!(error = %e, "Failed to record dispatch on tracked issue");
            }
        }

        info!(ok = outcome.is_ok(), message = outcome.message(), "Context dispatched");
        ContextOutcome {
            short_id: context.short_id.clone(),
            issue_number: context.gh_issue_number,
            ok: outcome.is_ok(),
            message: outcome.message().to_string(),
        }
    }

    /// Dispatch every context in order.
    pub async fn dispatch_all(&self, contexts: &[DispatchContext]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for context in contexts {
            summary.push(self.dispatch(context).await);
        }
        summary
    }
}

#[cfg(test)]
#[path = "contexts_tests.rs"]
mod tests;
