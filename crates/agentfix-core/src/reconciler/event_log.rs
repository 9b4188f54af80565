//! Marker event log.
//!
//! The tracker's comment history is the durable record of what AgentFix has
//! done to an issue. Comments carrying a hidden marker are read back as
//! [`MarkerEvent`]s; everything else is ignored. The reconciler only sees the
//! [`EventLog`] trait, so the comment-backed log can be replaced by real
//! storage without touching reconciliation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgentFixResult;

/// Hidden marker on comments and bodies that record tracking activity.
pub const TRACK_MARKER: &str = "<!-- agentfix-sentry-track -->";

/// Hidden marker on comments that record a dispatch attempt.
pub const DISPATCH_MARKER: &str = "<!-- agentfix-sentry-dispatch -->";

/// Which marker a logged comment carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Tracking,
    Dispatch,
}

impl MarkerKind {
    /// The hidden marker text.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Tracking => TRACK_MARKER,
            Self::Dispatch => DISPATCH_MARKER,
        }
    }
}

/// One marker found in an issue's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerEvent {
    pub kind: MarkerKind,
    pub recorded_at: DateTime<Utc>,
}

/// Ordered marker history of tracked issues.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Every marker event on `issue_number`, oldest first.
    async fn list_events(&self, issue_number: u64) -> AgentFixResult<Vec<MarkerEvent>>;
}

/// Turn `(body, created_at)` pairs into marker events, oldest first.
///
/// A comment carrying both markers yields one event per marker.
pub fn events_from_comments<'a, I>(comments: I) -> Vec<MarkerEvent>
where
    I: IntoIterator<Item = (&'a str, DateTime<Utc>)>,
{
    let mut events: Vec<MarkerEvent> = comments
        .into_iter()
        .flat_map(|(body, recorded_at)| {
            [MarkerKind::Tracking, MarkerKind::Dispatch]
                .into_iter()
                .filter(move |kind| body.contains(kind.marker()))
                .map(move |kind| MarkerEvent { kind, recorded_at })
        })
        .collect();

    events.sort_by_key(|event| event.recorded_at);
    events
}

/// Time of the most recent dispatch marker, if any.
pub fn last_dispatch_at(events: &[MarkerEvent]) -> Option<DateTime<Utc>> {
    events
        .iter()
        .filter(|event| event.kind == MarkerKind::Dispatch)
        .map(|event| event.recorded_at)
        .max()
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
