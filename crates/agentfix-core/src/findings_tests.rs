//! Tests for finding canonicalization and extraction.

use super::*;
use agentfix_github::client::IssueUser;

fn review_comment(
    author: &str,
    path: &str,
    line: Option<u64>,
    original_line: Option<u64>,
    body: &str,
) -> PullRequestReviewComment {
    PullRequestReviewComment {
        id: 1,
        path: Some(path.to_string()),
        line,
        original_line,
        body: body.to_string(),
        user: Some(IssueUser {
            login: author.to_string(),
        }),
    }
}

fn reviewers() -> Vec<String> {
    vec!["greptile".to_string(), "greptile[bot]".to_string()]
}

mod normalization {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize("Null   Pointer\n\tIN  handler"), "null pointer in handler");
    }

    #[test]
    fn test_normalize_keeps_path_characters() {
        assert_eq!(normalize("src/lib/user_profile.ts:42"), "src/lib/user_profile.ts:42");
    }

    #[test]
    fn test_normalize_strips_other_characters() {
        assert_eq!(normalize("Don't `unwrap()` here!"), "dont unwrap here");
    }

    #[test]
    fn test_normalize_trims_after_filtering() {
        assert_eq!(normalize("  (hello)  "), "hello");
    }
}

mod signatures {
    use super::*;

    #[test]
    fn test_signature_uses_zero_for_missing_line() {
        let finding = Finding::new("src/App.ts", None, "Broken import");
        assert_eq!(signature(&finding), "src/app.ts:0:broken import");
    }

    /// Given: Two findings that differ only in case and whitespace
    /// When: Their signatures are computed
    /// Then: The signatures are equal
    #[test]
    fn test_signature_ignores_case_and_whitespace() {
        let a = Finding::new("src/api.rs", Some(10), "Handle   the error");
        let b = Finding::new("SRC/api.rs", Some(10), "handle the\tERROR ");
        assert_eq!(signature(&a), signature(&b));
    }

    #[test]
    fn test_signature_strips_leading_fix_token() {
        let a = Finding::new("a.rs", Some(1), "Fix missing null check");
        let b = Finding::new("a.rs", Some(1), "missing null check");
        assert_eq!(signature(&a), signature(&b));
    }

    #[test]
    fn test_signature_strips_leading_issue_token() {
        let finding = Finding::new("a.rs", Some(1), "Issue missing null check");
        assert_eq!(finding.signature(), "a.rs:1:missing null check");
    }

    #[test]
    fn test_signature_keeps_words_that_only_start_with_fix() {
        let finding = Finding::new("a.rs", Some(1), "fixture is stale");
        assert_eq!(finding.signature(), "a.rs:1:fixture is stale");
    }

    #[test]
    fn test_signature_distinguishes_lines() {
        let a = Finding::new("a.rs", Some(1), "same");
        let b = Finding::new("a.rs", Some(2), "same");
        assert_ne!(signature(&a), signature(&b));
    }
}

mod deduplication {
    use super::*;

    #[test]
    fn test_dedupe_keeps_first_occurrence_in_order() {
        let findings = vec![
            Finding::new("a.rs", Some(1), "First problem"),
            Finding::new("b.rs", None, "Second problem"),
            Finding::new("A.rs", Some(1), "first   PROBLEM"),
            Finding::new("c.rs", Some(3), "Third problem"),
        ];

        let unique = dedupe(findings);

        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].summary, "First problem");
        assert_eq!(unique[1].file, "b.rs");
        assert_eq!(unique[2].file, "c.rs");
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let findings = vec![
            Finding::new("a.rs", Some(1), "x"),
            Finding::new("a.rs", Some(1), "X"),
            Finding::new("b.rs", Some(1), "fix x"),
            Finding::new("b.rs", Some(1), "x"),
        ];

        let once = dedupe(findings);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_dedupe_of_empty_list_is_empty() {
        assert!(dedupe(Vec::new()).is_empty());
    }
}

mod review_extraction {
    use super::*;

    #[test]
    fn test_only_allow_listed_authors_are_kept() {
        let comments = vec![
            review_comment("greptile[bot]", "src/a.ts", Some(4), None, "Guard the null"),
            review_comment("octocat", "src/b.ts", Some(9), None, "Nit: rename"),
        ];

        let findings = extract_findings_from_review_comments(&comments, &reviewers());

        assert_eq!(findings, vec![Finding::new("src/a.ts", Some(4), "Guard the null")]);
    }

    #[test]
    fn test_author_match_is_case_insensitive() {
        let comments = vec![review_comment("Greptile", "a.ts", Some(1), None, "x")];
        assert_eq!(
            extract_findings_from_review_comments(&comments, &reviewers())[0].file,
            "a.ts"
        );
    }

    /// Given: Logins that only contain an allow-listed name
    /// When: Findings are extracted
    /// Then: They are treated as unknown reviewers
    #[test]
    fn test_author_must_match_an_allow_listed_login_exactly() {
        let comments = vec![
            review_comment("greptile-apps[bot]", "a.ts", Some(1), None, "x"),
            review_comment("not-greptile", "b.ts", Some(2), None, "y"),
        ];
        let findings = extract_findings_from_review_comments(&comments, &reviewers());
        assert_eq!(
            findings,
            vec![Finding::new(UNKNOWN_FILE, None, NO_MATCHING_COMMENTS_SUMMARY)]
        );
    }

    #[test]
    fn test_line_falls_back_to_original_line() {
        let comments = vec![review_comment("greptile", "a.ts", None, Some(17), "x")];
        let findings = extract_findings_from_review_comments(&comments, &reviewers());
        assert_eq!(findings[0].line, Some(17));
    }

    #[test]
    fn test_summary_is_first_non_empty_line() {
        let comments = vec![review_comment(
            "greptile",
            "a.ts",
            Some(1),
            None,
            "\n\n  Missing await on save()  \nMore detail below.",
        )];
        let findings = extract_findings_from_review_comments(&comments, &reviewers());
        assert_eq!(findings[0].summary, "Missing await on save()");
    }

    #[test]
    fn test_summary_is_truncated() {
        let long = "a".repeat(MAX_SUMMARY_CHARS + 50);
        assert_eq!(summarize_comment(&long).chars().count(), MAX_SUMMARY_CHARS);
    }

    #[test]
    fn test_blank_body_uses_missing_summary() {
        assert_eq!(summarize_comment("  \n \n"), MISSING_SUMMARY);
    }

    /// Given: Review comments none of which come from an allow-listed reviewer
    /// When: Findings are extracted
    /// Then: A single placeholder finding is returned
    #[test]
    fn test_no_matching_comments_yields_placeholder() {
        let comments = vec![review_comment("octocat", "a.ts", Some(1), None, "x")];
        let findings = extract_findings_from_review_comments(&comments, &reviewers());
        assert_eq!(
            findings,
            vec![Finding::new(UNKNOWN_FILE, None, NO_MATCHING_COMMENTS_SUMMARY)]
        );
    }

    #[test]
    fn test_comment_without_path_uses_unknown_file() {
        let mut comment = review_comment("greptile", "a.ts", Some(1), None, "x");
        comment.path = None;
        let findings = extract_findings_from_review_comments(&[comment], &reviewers());
        assert_eq!(findings[0].file, UNKNOWN_FILE);
    }
}

mod stack_trace_inference {
    use super::*;

    #[test]
    fn test_parenthesized_location_is_used() {
        let trace = "  at handleClick (src/components/Button.tsx:12:5)\n  at run (src/main.ts:3:1)";
        assert_eq!(infer_file_from_stack_trace(trace), "src/components/Button.tsx");
    }

    #[test]
    fn test_bare_location_is_used_when_no_parentheses() {
        let trace = "at render app/views/home.js:40:2";
        assert_eq!(infer_file_from_stack_trace(trace), "app/views/home.js");
    }

    #[test]
    fn test_unknown_when_no_location_found() {
        assert_eq!(infer_file_from_stack_trace(""), UNKNOWN_FILE);
        assert_eq!(infer_file_from_stack_trace("TypeError: boom"), UNKNOWN_FILE);
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_missing_line_is_omitted_from_json() {
        let json = serde_json::to_value(Finding::new("a.rs", None, "x")).unwrap();
        assert_eq!(json, serde_json::json!({"file": "a.rs", "summary": "x"}));
    }
}
