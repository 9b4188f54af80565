//! Tests for error classification.

use super::*;

mod truncation {
    use super::*;

    #[test]
    fn test_truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("not found"), "not found");
    }

    #[test]
    fn test_truncate_body_limits_long_bodies() {
        let body = "x".repeat(1000);
        assert_eq!(truncate_body(&body).len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS);
    }
}

mod transient_classification {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        let error = ApiError::HttpError {
            status: 503,
            url: "https://api.github.com/repos/o/r/issues".to_string(),
            message: "unavailable".to_string(),
        };
        assert!(error.is_transient());
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let error = ApiError::HttpError {
            status: 422,
            url: "https://api.github.com/repos/o/r/issues".to_string(),
            message: "Validation Failed".to_string(),
        };
        assert!(!error.is_transient());
    }

    #[test]
    fn test_auth_errors_classification() {
        assert!(!AuthError::InvalidCredentials.is_transient());
        assert!(AuthError::TokenExpired.is_transient());
        assert!(AuthError::NetworkError("reset".to_string()).is_transient());
        assert!(!AuthError::InstallationNotFound {
            installation_id: InstallationId::new(7)
        }
        .is_transient());
    }

    #[test]
    fn test_http_error_message_includes_status_and_url() {
        let error = ApiError::HttpError {
            status: 404,
            url: "https://api.github.com/repos/o/r".to_string(),
            message: "Not Found".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "GitHub API 404 https://api.github.com/repos/o/r: Not Found"
        );
    }
}
