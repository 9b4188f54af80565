//! Tests for the error taxonomy.

use super::*;

#[test]
fn test_configuration_errors_are_permanent() {
    let error = AgentFixError::Configuration(ConfigError::Missing {
        keys: vec!["sentry.auth_token".to_string()],
    });
    assert!(!error.is_transient());
    assert!(error.to_string().contains("sentry.auth_token"));
}

#[test]
fn test_issue_source_server_errors_are_transient() {
    let error = AgentFixError::IssueSource {
        status: 503,
        url: "https://sentry.io/api/0/".to_string(),
        body: "busy".to_string(),
    };
    assert!(error.is_transient());
    assert_eq!(error.upstream_status(), Some(503));
}

#[test]
fn test_tracker_errors_expose_status() {
    let error = AgentFixError::from(ApiError::HttpError {
        status: 404,
        url: "https://api.github.com/repos/o/r/issues/1/comments".to_string(),
        message: "Not Found".to_string(),
    });
    assert_eq!(error.upstream_status(), Some(404));
    assert!(!error.is_transient());
}
