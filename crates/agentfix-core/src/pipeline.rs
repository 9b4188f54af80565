//! Staged Sentry run: fetch, reconcile, dispatch.
//!
//! The stages are connected by bounded channels and driven on a single task.
//! Issues are reconciled strictly in fetch order, and a record is dispatched
//! as soon as its reconciliation finishes.
//!
//! A fetch or reconcile failure stops reconciliation immediately. The dispatch
//! stage is never cancelled: it drains the records already reconciled, so
//! every dispatch that reaches the provider also gets its marker comment.
//! The failure is then returned, wrapped in [`AgentFixError::RunAborted`]
//! when any dispatch completed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::config::AgentFixConfig;
use crate::dispatch::{build_dispatch_contexts, BatchSummary, ContextDispatcher};
use crate::error::{AgentFixError, AgentFixResult};
use crate::reconciler::{ReconciliationRecord, Reconciler, RunCounters};
use crate::sentry::{ExternalIssue, IssueSource};

/// Default capacity of the channels between stages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Run-wide settings for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Repository named in dispatched events
    pub repository: String,
    pub target_branch: String,
    /// Records dispatched per run; later records are reconciled only
    pub max_fixes: usize,
    pub channel_capacity: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &AgentFixConfig) -> Self {
        Self {
            repository: config
                .tracker
                .repository
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            target_branch: config.dispatch.target_branch.clone(),
            max_fixes: config.dispatch.max_fixes,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Summary of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    #[serde(flatten)]
    pub counters: RunCounters,
    pub to_fix: usize,
    pub selected: usize,
    pub dispatch: BatchSummary,
}

impl PipelineSummary {
    /// True when every selected record dispatched successfully.
    pub fn is_success(&self) -> bool {
        self.dispatch.is_success()
    }
}

/// Fetch, reconcile, and dispatch in one run.
pub struct Pipeline {
    source: Arc<dyn IssueSource>,
    reconciler: Reconciler,
    dispatcher: ContextDispatcher,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn IssueSource>,
        reconciler: Reconciler,
        dispatcher: ContextDispatcher,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            reconciler,
            dispatcher,
            settings,
        }
    }

    /// Execute one run with cooldowns evaluated at `now`.
    ///
    /// # Errors
    ///
    /// The first fetch or reconcile failure, wrapped in
    /// `AgentFixError::RunAborted` together with the completed dispatches
    /// when there were any. Dispatch failures are reported in the summary,
    /// not as errors.
    #[instrument(skip(self), fields(repository = %self.settings.repository))]
    pub async fn run(&self, now: DateTime<Utc>) -> AgentFixResult<PipelineSummary> {
        let capacity = self.settings.channel_capacity.max(1);
        let (issue_tx, issue_rx) = mpsc::channel(capacity);
        let (record_tx, record_rx) = mpsc::channel(capacity);

        let upstream = async {
            tokio::try_join!(
                self.fetch_stage(issue_tx),
                self.reconcile_stage(issue_rx, record_tx, now),
            )
        };
        let (upstream, (selected, dispatch)) =
            tokio::join!(upstream, self.dispatch_stage(record_rx));

        let (fetched, counters) = match upstream {
            Ok(stages) => stages,
            Err(error) if dispatch.outcomes.is_empty() => return Err(error),
            Err(error) => {
                warn!(
                    error = %error,
                    dispatched = dispatch.outcomes.len(),
                    "Run aborted after dispatching reconciled records"
                );
                return Err(AgentFixError::RunAborted {
                    source: Box::new(error),
                    dispatch,
                });
            }
        };

        let summary = PipelineSummary {
            to_fix: counters.to_fix(),
            counters,
            selected,
            dispatch,
        };
        info!(
            fetched,
            to_fix = summary.to_fix,
            selected = summary.selected,
            failures = summary.dispatch.failures,
            "Pipeline run finished"
        );
        Ok(summary)
    }

    async fn fetch_stage(&self, issues: mpsc::Sender<ExternalIssue>) -> AgentFixResult<usize> {
        let fetched = self.source.fetch_unresolved().await?;
        let count = fetched.len();
        debug!(count, "Fetched unresolved issues");

        for issue in fetched {
            issues
                .send(issue)
                .await
                .map_err(|_| closed("fetch", "reconcile"))?;
        }
        Ok(count)
    }

    async fn reconcile_stage(
        &self,
        mut issues: mpsc::Receiver<ExternalIssue>,
        records: mpsc::Sender<ReconciliationRecord>,
        now: DateTime<Utc>,
    ) -> AgentFixResult<RunCounters> {
        let mut index = self.reconciler.load_index().await?;
        let mut counters = RunCounters::default();

        while let Some(issue) = issues.recv().await {
            counters.input_issues += 1;
            let outcome = self.reconciler.reconcile_issue(&mut index, &issue, now).await?;
            counters.record(outcome.as_ref().map(|r| r.tracking_state));

            if let Some(record) = outcome {
                records
                    .send(record)
                    .await
                    .map_err(|_| closed("reconcile", "dispatch"))?;
            }
        }
        Ok(counters)
    }

    /// Runs until the record channel closes, whether reconciliation finished
    /// or failed.
    async fn dispatch_stage(
        &self,
        mut records: mpsc::Receiver<ReconciliationRecord>,
    ) -> (usize, BatchSummary) {
        let mut summary = BatchSummary::default();
        let mut selected = 0;

        while let Some(record) = records.recv().await {
            if selected >= self.settings.max_fixes {
                continue;
            }
            selected += 1;
            let contexts = build_dispatch_contexts(
                std::slice::from_ref(&record),
                &self.settings.repository,
                &self.settings.target_branch,
                1,
            );
            for context in &contexts {
                summary.push(self.dispatcher.dispatch(context).await);
            }
        }
        (selected, summary)
    }
}

fn closed(stage: &str, downstream: &str) -> AgentFixError {
    AgentFixError::Stage {
        stage: stage.to_string(),
        message: format!("{} stage stopped receiving", downstream),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
