//! Tests for webhook event classification.

use super::*;
use serde_json::json;

fn review_payload(action: &str, state: &str) -> serde_json::Value {
    json!({
        "action": action,
        "review": { "state": state, "user": { "login": "greptile[bot]" } },
        "pull_request": { "number": 17, "head": { "ref": "feature/login" } },
        "repository": { "full_name": "acme/widgets" },
        "installation": { "id": 4242 }
    })
}

mod classification {
    use super::*;

    #[test]
    fn test_ping_is_recognized() {
        let event = WebhookEvent::classify(Some("ping"), &json!({"zen": "Keep it simple"})).unwrap();
        assert_eq!(event, WebhookEvent::Ping);
    }

    #[test]
    fn test_submitted_changes_requested_is_actionable() {
        let event = WebhookEvent::classify(
            Some("pull_request_review"),
            &review_payload("submitted", "changes_requested"),
        )
        .unwrap();

        assert_eq!(
            event,
            WebhookEvent::ChangesRequested(ChangesRequestedReview {
                repository: "acme/widgets".to_string(),
                pull_request_number: 17,
                head_ref: "feature/login".to_string(),
                installation_id: Some(InstallationId::new(4242)),
                reviewer: Some("greptile[bot]".to_string()),
            })
        );
    }

    #[test]
    fn test_approved_review_is_ignored() {
        let event = WebhookEvent::classify(
            Some("pull_request_review"),
            &review_payload("submitted", "approved"),
        )
        .unwrap();
        assert!(matches!(event, WebhookEvent::Ignored { .. }));
    }

    #[test]
    fn test_edited_review_is_ignored() {
        let event = WebhookEvent::classify(
            Some("pull_request_review"),
            &review_payload("edited", "changes_requested"),
        )
        .unwrap();
        assert!(matches!(event, WebhookEvent::Ignored { .. }));
    }

    #[test]
    fn test_missing_head_ref_is_ignored() {
        let payload = json!({
            "action": "submitted",
            "review": { "state": "changes_requested" },
            "pull_request": { "number": 3 },
            "repository": { "full_name": "acme/widgets" }
        });
        let event = WebhookEvent::classify(Some("pull_request_review"), &payload).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored { .. }));
    }

    #[test]
    fn test_other_event_types_are_ignored() {
        let event = WebhookEvent::classify(Some("push"), &json!({})).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored { reason } if reason.contains("push")));
    }

    #[test]
    fn test_missing_event_header_is_ignored() {
        let event = WebhookEvent::classify(None, &json!({})).unwrap();
        assert!(matches!(event, WebhookEvent::Ignored { .. }));
    }

    #[test]
    fn test_non_object_review_payload_is_an_error() {
        let result = WebhookEvent::classify(Some("pull_request_review"), &json!([1, 2]));
        assert!(result.is_err());
    }
}
