//! # Issue Reconciler
//!
//! Cross-references unresolved Sentry issues against the tracked issues of a
//! repository and drives each one forward:
//!
//! | Tracked issue | Action | State |
//! |---|---|---|
//! | none | create with tracking marker | `created` |
//! | closed | reopen and comment | `reopened` |
//! | open, last attempt older than cooldown | requeue comment | `requeued` |
//! | open, within cooldown | nothing | skipped |
//!
//! The last attempt is the newest dispatch marker in the issue's
//! [`EventLog`], or the issue's creation time when there is none.
//!
//! Issues are processed strictly one after another so writes to a given
//! tracked issue never interleave. Any tracker failure aborts the run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use agentfix_github::client::IssueState;

use crate::config::AgentFixConfig;
use crate::error::AgentFixResult;
use crate::sentry::ExternalIssue;

pub mod event_log;
pub mod github;
pub mod templates;

pub use event_log::{
    events_from_comments, last_dispatch_at, EventLog, MarkerEvent, MarkerKind, DISPATCH_MARKER,
    TRACK_MARKER,
};
pub use github::GitHubTracker;

// ============================================================================
// Tracker Seam
// ============================================================================

/// An issue as the reconciler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedIssue {
    pub number: u64,
    pub title: String,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub is_pull_request: bool,
}

/// Writes and reads the reconciler performs against the issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Every issue carrying `label`, in any state, across all pages.
    async fn list_tracked_issues(&self, label: &str) -> AgentFixResult<Vec<TrackedIssue>>;

    /// Create an issue, returning its number.
    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> AgentFixResult<u64>;

    async fn reopen_issue(&self, issue_number: u64) -> AgentFixResult<()>;

    async fn post_comment(&self, issue_number: u64, body: &str) -> AgentFixResult<()>;
}

// ============================================================================
// Records
// ============================================================================

/// What happened to a Sentry issue this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Created,
    Reopened,
    Requeued,
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Reopened => "reopened",
            Self::Requeued => "requeued",
        };
        f.write_str(name)
    }
}

/// A Sentry issue selected for remediation, with its tracked issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRecord {
    #[serde(flatten)]
    pub issue: ExternalIssue,
    pub gh_issue_number: u64,
    pub tracking_state: TrackingState,
}

/// Per-run totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounters {
    pub input_issues: usize,
    pub created: usize,
    pub reopened: usize,
    pub requeued: usize,
    pub skipped: usize,
}

impl RunCounters {
    /// Count one reconciliation outcome.
    pub fn record(&mut self, outcome: Option<TrackingState>) {
        match outcome {
            Some(TrackingState::Created) => self.created += 1,
            Some(TrackingState::Reopened) => self.reopened += 1,
            Some(TrackingState::Requeued) => self.requeued += 1,
            None => self.skipped += 1,
        }
    }

    /// Issues selected for remediation.
    pub fn to_fix(&self) -> usize {
        self.created + self.reopened + self.requeued
    }
}

/// Output of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationReport {
    pub records: Vec<ReconciliationRecord>,
    pub counters: RunCounters,
}

// ============================================================================
// Tracked Index
// ============================================================================

/// In-memory view of the tracked issues for one run.
///
/// Pull requests and discussion issues are dropped on construction. Issues
/// created during the run are added so a repeated short id in the same input
/// finds the issue that was just created.
#[derive(Debug, Clone, Default)]
pub struct TrackedIndex {
    issues: Vec<TrackedIssue>,
}

impl TrackedIndex {
    pub fn new(issues: Vec<TrackedIssue>, discussion_prefix: &str) -> Self {
        let issues = issues
            .into_iter()
            .filter(|issue| !issue.is_pull_request)
            .filter(|issue| discussion_prefix.is_empty() || !issue.title.starts_with(discussion_prefix))
            .collect();
        Self { issues }
    }

    /// First tracked issue whose title carries the short id's token.
    pub fn find(&self, short_id: &str) -> Option<&TrackedIssue> {
        let token = templates::title_token(short_id);
        self.issues.iter().find(|issue| issue.title.contains(&token))
    }

    pub fn insert(&mut self, issue: TrackedIssue) {
        self.issues.push(issue);
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Settings for a reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    /// Label every tracked issue carries
    pub label: String,
    /// Titles starting with this are never matched
    pub discussion_prefix: String,
    /// Minimum hours between dispatch attempts on an open issue
    pub cooldown_hours: f64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            label: "sentry".to_string(),
            discussion_prefix: "[Discussion]".to_string(),
            cooldown_hours: 24.0,
        }
    }
}

impl ReconcilerSettings {
    pub fn from_config(config: &AgentFixConfig) -> Self {
        Self {
            label: config.tracker.label.clone(),
            discussion_prefix: config.tracker.discussion_prefix.clone(),
            cooldown_hours: config.reconciler.cooldown_hours,
        }
    }
}

/// Drives Sentry issues through their tracking states.
pub struct Reconciler {
    tracker: Arc<dyn IssueTracker>,
    events: Arc<dyn EventLog>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        events: Arc<dyn EventLog>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            tracker,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Read every tracked issue into an index.
    pub async fn load_index(&self) -> AgentFixResult<TrackedIndex> {
        let issues = self.tracker.list_tracked_issues(&self.settings.label).await?;
        let index = TrackedIndex::new(issues, &self.settings.discussion_prefix);
        debug!(tracked = index.len(), label = %self.settings.label, "Loaded tracked issues");
        Ok(index)
    }

    /// Reconcile a batch of Sentry issues in order.
    #[instrument(skip(self, issues), fields(input_issues = issues.len()))]
    pub async fn reconcile(
        &self,
        issues: &[ExternalIssue],
        now: DateTime<Utc>,
    ) -> AgentFixResult<ReconciliationReport> {
        let mut index = self.load_index().await?;
        let mut report = ReconciliationReport {
            counters: RunCounters {
                input_issues: issues.len(),
                ..Default::default()
            },
            ..Default::default()
        };

        for issue in issues {
            let outcome = self.reconcile_issue(&mut index, issue, now).await?;
            report
                .counters
                .record(outcome.as_ref().map(|r| r.tracking_state));
            report.records.extend(outcome);
        }

        info!(
            created = report.counters.created,
            reopened = report.counters.reopened,
            requeued = report.counters.requeued,
            skipped = report.counters.skipped,
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Reconcile one Sentry issue against `index`.
    ///
    /// Returns `None` when the issue is open and still within its cooldown.
    #[instrument(skip(self, index, issue), fields(short_id = %issue.short_id))]
    pub async fn reconcile_issue(
        &self,
        index: &mut TrackedIndex,
        issue: &ExternalIssue,
        now: DateTime<Utc>,
    ) -> AgentFixResult<Option<ReconciliationRecord>> {
        let Some(existing) = index.find(&issue.short_id).cloned() else {
            let number = self.create(issue).await?;
            index.insert(TrackedIssue {
                number,
                title: templates::issue_title(issue),
                state: IssueState::Open,
                created_at: now,
                is_pull_request: false,
            });
            info!(issue_number = number, "Created tracked issue");
            return Ok(Some(record(issue, number, TrackingState::Created)));
        };

        if existing.state == IssueState::Closed {
            self.tracker.reopen_issue(existing.number).await?;
            self.tracker
                .post_comment(existing.number, &templates::reopen_comment())
                .await?;
            info!(issue_number = existing.number, "Reopened tracked issue");
            return Ok(Some(record(issue, existing.number, TrackingState::Reopened)));
        }

        let events = self.events.list_events(existing.number).await?;
        let last_attempt = last_dispatch_at(&events).unwrap_or(existing.created_at);
        let elapsed_hours = elapsed_hours(last_attempt, now);

        if elapsed_hours < self.settings.cooldown_hours {
            debug!(
                issue_number = existing.number,
                elapsed_hours,
                cooldown_hours = self.settings.cooldown_hours,
                "Within cooldown, skipping"
            );
            return Ok(None);
        }

        self.tracker
            .post_comment(
                existing.number,
                &templates::requeue_comment(self.settings.cooldown_hours),
            )
            .await?;
        info!(issue_number = existing.number, elapsed_hours, "Requeued tracked issue");
        Ok(Some(record(issue, existing.number, TrackingState::Requeued)))
    }

    async fn create(&self, issue: &ExternalIssue) -> AgentFixResult<u64> {
        let labels: Vec<String> = templates::CREATED_LABELS
            .iter()
            .map(|l| l.to_string())
            .collect();
        self.tracker
            .create_issue(
                &templates::issue_title(issue),
                &templates::issue_body(issue),
                &labels,
            )
            .await
    }
}

fn record(issue: &ExternalIssue, number: u64, state: TrackingState) -> ReconciliationRecord {
    ReconciliationRecord {
        issue: issue.clone(),
        gh_issue_number: number,
        tracking_state: state,
    }
}

/// Fractional hours from `since` to `now`.
pub fn elapsed_hours(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - since).num_milliseconds() as f64 / 3_600_000.0
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
