//! Tests for reading marker events out of comment history.

use super::*;
use chrono::TimeZone;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, hour, 0, 0).unwrap()
}

#[test]
fn test_unmarked_comments_are_ignored() {
    let events = events_from_comments([("Looks good to me", at(1)), ("", at(2))]);
    assert!(events.is_empty());
}

#[test]
fn test_events_are_ordered_oldest_first() {
    let dispatch = format!("{}\n\nDispatch result: ok", DISPATCH_MARKER);
    let track = format!("{}\n\nAuto-reopened by AgentFix.", TRACK_MARKER);
    let events = events_from_comments([(dispatch.as_str(), at(9)), (track.as_str(), at(3))]);

    assert_eq!(
        events,
        vec![
            MarkerEvent { kind: MarkerKind::Tracking, recorded_at: at(3) },
            MarkerEvent { kind: MarkerKind::Dispatch, recorded_at: at(9) },
        ]
    );
}

#[test]
fn test_comment_with_both_markers_yields_two_events() {
    let body = format!("{} {}", TRACK_MARKER, DISPATCH_MARKER);
    let events = events_from_comments([(body.as_str(), at(4))]);
    assert_eq!(events.len(), 2);
}

/// Given: Several dispatch markers out of order plus a later tracking marker
/// When: The last dispatch time is computed
/// Then: The newest dispatch marker wins and tracking markers are ignored
#[test]
fn test_last_dispatch_is_most_recent_dispatch_marker() {
    let events = vec![
        MarkerEvent { kind: MarkerKind::Dispatch, recorded_at: at(8) },
        MarkerEvent { kind: MarkerKind::Dispatch, recorded_at: at(2) },
        MarkerEvent { kind: MarkerKind::Tracking, recorded_at: at(20) },
    ];
    assert_eq!(last_dispatch_at(&events), Some(at(8)));
}

#[test]
fn test_last_dispatch_is_none_without_dispatch_markers() {
    let events = vec![MarkerEvent { kind: MarkerKind::Tracking, recorded_at: at(1) }];
    assert_eq!(last_dispatch_at(&events), None);
}
