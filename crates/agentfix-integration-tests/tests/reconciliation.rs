//! Reconciliation against a mocked GitHub repository.
//!
//! Exercises the reconciler through the real `GitHubTracker`, so issue
//! listing, marker history and every write go over HTTP.

mod common;

use agentfix_core::reconciler::{
    Reconciler, ReconcilerSettings, TrackingState, DISPATCH_MARKER, TRACK_MARKER,
};
use agentfix_core::AgentFixError;
use common::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reconciler(server: &MockServer) -> Reconciler {
    let tracker = tracker(server);
    Reconciler::new(tracker.clone(), tracker, ReconcilerSettings::default())
}

/// Given: No tracked issue mentions the Sentry short id
/// When: The issue is reconciled
/// Then: A labelled issue is created with the tracking marker in its body
#[tokio::test]
async fn test_untracked_issue_is_created() {
    let server = MockServer::start().await;
    mount_tracked_issues(
        &server,
        json!([issue_json(3, "[Discussion] [Sentry WEB-1] notes", "open", hours_ago(200))]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues"))
        .and(body_partial_json(json!({
            "title": "[Sentry WEB-1] TypeError: boom",
            "labels": ["bug", "needs-test", "sentry"]
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(issue_json(41, "[Sentry WEB-1] TypeError: boom", "open", now())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let report = reconciler(&server)
        .reconcile(&[external_issue("WEB-1", "TypeError: boom")], now())
        .await
        .unwrap();

    assert_eq!(report.counters.created, 1);
    assert_eq!(report.records[0].gh_issue_number, 41);
    assert_eq!(report.records[0].tracking_state, TrackingState::Created);

    let body = request_body(&server, "/repos/acme/widgets/issues").await.unwrap();
    let body = body["body"].as_str().unwrap();
    assert!(body.starts_with(TRACK_MARKER));
    assert!(body.contains("| Sentry ID | `WEB-1` |"));
}

/// Given: The tracked issue for the short id is closed
/// When: The issue is reconciled
/// Then: It is reopened and a tracking comment is posted
#[tokio::test]
async fn test_closed_issue_is_reopened() {
    let server = MockServer::start().await;
    mount_tracked_issues(
        &server,
        json!([issue_json(5, "[Sentry WEB-2] RangeError", "closed", hours_ago(500))]),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/widgets/issues/5"))
        .and(body_partial_json(json!({"state": "open"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(issue_json(5, "[Sentry WEB-2] RangeError", "open", hours_ago(500))),
        )
        .expect(1)
        .mount(&server)
        .await;
    expect_comments_posted(&server, 5, 1).await;

    let report = reconciler(&server)
        .reconcile(&[external_issue("WEB-2", "RangeError")], now())
        .await
        .unwrap();

    assert_eq!(report.counters.reopened, 1);
    assert_eq!(report.records[0].tracking_state, TrackingState::Reopened);
    let comments = posted_comments(&server, 5).await;
    assert!(comments[0].contains(TRACK_MARKER));
}

/// Given: An open tracked issue whose last dispatch is older than the cooldown
/// When: The issue is reconciled
/// Then: A requeue comment is posted and the issue is selected again
#[tokio::test]
async fn test_open_issue_past_cooldown_is_requeued() {
    let server = MockServer::start().await;
    mount_tracked_issues(
        &server,
        json!([issue_json(8, "[Sentry WEB-3] Timeout", "open", hours_ago(100))]),
    )
    .await;
    mount_issue_comments(
        &server,
        8,
        json!([
            comment_json(1, &format!("{}\nfirst", DISPATCH_MARKER), hours_ago(60)),
            comment_json(2, &format!("{}\nsecond", DISPATCH_MARKER), hours_ago(30)),
            comment_json(3, "human note", hours_ago(2))
        ]),
    )
    .await;
    expect_comments_posted(&server, 8, 1).await;

    let report = reconciler(&server)
        .reconcile(&[external_issue("WEB-3", "Timeout")], now())
        .await
        .unwrap();

    assert_eq!(report.counters.requeued, 1);
    assert_eq!(report.records[0].gh_issue_number, 8);
    assert!(posted_comments(&server, 8).await[0].contains("after 24h cooldown"));
}

/// Given: An open tracked issue dispatched two hours ago
/// When: The issue is reconciled with a 24 hour cooldown
/// Then: Nothing is written and the issue is counted as skipped
#[tokio::test]
async fn test_open_issue_within_cooldown_is_skipped() {
    let server = MockServer::start().await;
    mount_tracked_issues(
        &server,
        json!([issue_json(9, "[Sentry WEB-4] Flaky", "open", hours_ago(100))]),
    )
    .await;
    mount_issue_comments(
        &server,
        9,
        json!([comment_json(1, DISPATCH_MARKER, hours_ago(2))]),
    )
    .await;
    expect_comments_posted(&server, 9, 0).await;

    let report = reconciler(&server)
        .reconcile(&[external_issue("WEB-4", "Flaky")], now())
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.counters.skipped, 1);
    assert_eq!(report.counters.input_issues, 1);
}

/// Given: A repository with no tracked issues
/// When: The same short id appears twice in one run
/// Then: The first occurrence creates the issue and the second is skipped
#[tokio::test]
async fn test_repeated_short_id_reuses_created_issue() {
    let server = MockServer::start().await;
    mount_tracked_issues(&server, json!([])).await;
    expect_issue_created(&server, 60, 1).await;
    mount_issue_comments(&server, 60, json!([])).await;

    let issue = external_issue("WEB-5", "Duplicate");
    let report = reconciler(&server)
        .reconcile(&[issue.clone(), issue], now())
        .await
        .unwrap();

    assert_eq!(report.counters.created, 1);
    assert_eq!(report.counters.skipped, 1);
    assert_eq!(report.records.len(), 1);
}

/// Given: The comment history of a tracked issue cannot be read
/// When: A batch is reconciled
/// Then: The run stops with a tracker error before touching later issues
#[tokio::test]
async fn test_comment_failure_stops_the_run() {
    let server = MockServer::start().await;
    mount_tracked_issues(
        &server,
        json!([issue_json(11, "[Sentry WEB-6] Broken", "open", hours_ago(100))]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/11/comments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    expect_issue_created(&server, 70, 0).await;

    let result = reconciler(&server)
        .reconcile(
            &[
                external_issue("WEB-6", "Broken"),
                external_issue("WEB-7", "Never reached"),
            ],
            now(),
        )
        .await;

    assert!(matches!(result, Err(AgentFixError::Tracker(_))));
}
