//! Text posted to the tracker.

use chrono::SecondsFormat;

use crate::reconciler::event_log::TRACK_MARKER;
use crate::sentry::ExternalIssue;

/// Labels applied to every issue the reconciler creates.
pub const CREATED_LABELS: [&str; 3] = ["bug", "needs-test", "sentry"];

/// Title token that ties a tracked issue to a Sentry short id.
pub fn title_token(short_id: &str) -> String {
    format!("[Sentry {}]", short_id)
}

pub fn issue_title(issue: &ExternalIssue) -> String {
    format!("{} {}", title_token(&issue.short_id), issue.title)
}

/// Body of a newly created tracked issue.
pub fn issue_body(issue: &ExternalIssue) -> String {
    let culprit = if issue.culprit.is_empty() {
        "unknown"
    } else {
        issue.culprit.as_str()
    };
    let stack_trace = if issue.stack_trace.is_empty() {
        "No stack trace available"
    } else {
        issue.stack_trace.as_str()
    };

    [
        TRACK_MARKER.to_string(),
        String::new(),
        "## Error Details".to_string(),
        String::new(),
        "| Field | Value |".to_string(),
        "|---|---|".to_string(),
        format!("| Project | `{}` |", issue.project),
        format!("| Sentry ID | `{}` |", issue.short_id),
        format!("| Level | {} |", issue.level),
        format!("| Culprit | `{}` |", culprit),
        format!("| Events | {} |", issue.count),
        format!(
            "| Last seen | {} |",
            issue.last_seen.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        String::new(),
        "## Stack Trace".to_string(),
        String::new(),
        "```".to_string(),
        stack_trace.to_string(),
        "```".to_string(),
        String::new(),
        "## Action Required".to_string(),
        String::new(),
        "1. Add/extend a test that reproduces the issue.".to_string(),
        "2. Fix root cause with minimal scope.".to_string(),
        "3. Link fix PR in this issue.".to_string(),
        String::new(),
        "_Created by AgentFix Sentry pipeline_".to_string(),
    ]
    .join("\n")
}

pub fn reopen_comment() -> String {
    [
        TRACK_MARKER,
        "",
        "Sentry still reports this issue unresolved.",
        "Auto-reopened by AgentFix.",
    ]
    .join("\n")
}

pub fn requeue_comment(cooldown_hours: f64) -> String {
    format!(
        "{}\n\nIssue is still unresolved in Sentry and has been re-queued after {}h cooldown.",
        TRACK_MARKER, cooldown_hours
    )
}

#[cfg(test)]
#[path = "templates_tests.rs"]
mod tests;
