//! Common test utilities for AgentFix integration tests
//!
//! This module provides:
//! - Clients bound to a `wiremock` server standing in for GitHub, Sentry and
//!   the remediation service
//! - Builders for the JSON those services return
//! - Mount helpers for the endpoints most tests touch

#![allow(dead_code)]

use agentfix_core::reconciler::GitHubTracker;
use agentfix_core::sentry::ExternalIssue;
use agentfix_github::client::{ClientConfig, RepositoryClient, RepositoryName};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Repository every test tracks issues in.
pub const REPOSITORY: &str = "acme/widgets";

/// RSA key registered for the test GitHub App.
pub const TEST_PRIVATE_KEY_PEM: &str =
    include_str!("../../../agentfix-github/test-data/app_private_key.pem");

/// Fixed reference time so cooldown arithmetic is deterministic.
pub fn now() -> DateTime<Utc> {
    "2026-03-01T12:00:00Z"
        .parse()
        .expect("reference time is valid RFC 3339")
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    now() - Duration::hours(hours)
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// Clients
// ============================================================================

/// Tracker for [`REPOSITORY`] talking to `server`.
pub fn tracker(server: &MockServer) -> Arc<GitHubTracker> {
    let client = RepositoryClient::new(
        ClientConfig::default().with_github_api_url(server.uri()),
        REPOSITORY.parse::<RepositoryName>().expect("valid repository"),
        "ghs_integration",
    )
    .expect("client builds");
    Arc::new(GitHubTracker::new(client))
}

// ============================================================================
// Fixtures
// ============================================================================

/// A Sentry issue as the fetch stage hands it over.
pub fn external_issue(short_id: &str, title: &str) -> ExternalIssue {
    ExternalIssue {
        id: format!("id-{}", short_id),
        project: "web".to_string(),
        short_id: short_id.to_string(),
        title: title.to_string(),
        culprit: "app/save.js in save".to_string(),
        count: "12".to_string(),
        level: "error".to_string(),
        first_seen: hours_ago(72),
        last_seen: hours_ago(1),
        stack_trace: "TypeError: boom\n  at save (app/save.js:4:2)".to_string(),
        tags: BTreeMap::new(),
    }
}

/// Issue JSON as returned by the issues listing.
pub fn issue_json(number: u64, title: &str, state: &str, created_at: DateTime<Utc>) -> Value {
    json!({
        "number": number,
        "title": title,
        "state": state,
        "labels": [{"name": "sentry"}],
        "created_at": timestamp(created_at),
        "html_url": format!("https://github.com/{}/issues/{}", REPOSITORY, number)
    })
}

/// Conversation comment JSON.
pub fn comment_json(id: u64, body: &str, created_at: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "body": body,
        "user": {"login": "agentfix[bot]"},
        "created_at": timestamp(created_at)
    })
}

// ============================================================================
// GitHub Mounts
// ============================================================================

fn repo_path(suffix: &str) -> String {
    format!("/repos/{}/{}", REPOSITORY, suffix)
}

pub async fn mount_tracked_issues(server: &MockServer, issues: Value) {
    Mock::given(method("GET"))
        .and(path(repo_path("issues")))
        .respond_with(ResponseTemplate::new(200).set_body_json(issues))
        .mount(server)
        .await;
}

pub async fn mount_issue_comments(server: &MockServer, number: u64, comments: Value) {
    Mock::given(method("GET"))
        .and(path(repo_path(&format!("issues/{}/comments", number))))
        .respond_with(ResponseTemplate::new(200).set_body_json(comments))
        .mount(server)
        .await;
}

/// Accept every comment posted on `number`, expecting exactly `times` posts.
pub async fn expect_comments_posted(server: &MockServer, number: u64, times: u64) {
    Mock::given(method("POST"))
        .and(path(repo_path(&format!("issues/{}/comments", number))))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(comment_json(9000 + number, "ok", now())),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Accept issue creation, replying with `number`, expecting `times` calls.
pub async fn expect_issue_created(server: &MockServer, number: u64, times: u64) {
    Mock::given(method("POST"))
        .and(path(repo_path("issues")))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(issue_json(number, "created", "open", now())),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Bodies of every comment POSTed to `number`.
pub async fn posted_comments(server: &MockServer, number: u64) -> Vec<String> {
    let comments_path = repo_path(&format!("issues/{}/comments", number));
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == comments_path)
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).expect("comment body is JSON");
            body["body"].as_str().unwrap_or_default().to_string()
        })
        .collect()
}

/// JSON body of the first request to `request_path`.
pub async fn request_body(server: &MockServer, request_path: &str) -> Option<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .find(|r| r.url.path() == request_path)
        .and_then(|r| serde_json::from_slice(&r.body).ok())
}
