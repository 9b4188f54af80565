//! # Findings
//!
//! A finding is one thing remediation should fix: a file, an optional line and
//! a free-text summary. Findings arrive from reviewers and from stack traces,
//! often with the same problem phrased slightly differently, so each one is
//! reduced to a canonical [`signature`] and [`dedupe`] keeps the first finding
//! per signature.

use agentfix_github::client::PullRequestReviewComment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Longest summary kept from a review comment.
pub const MAX_SUMMARY_CHARS: usize = 240;

/// Summary used when a review comment has no text.
pub const MISSING_SUMMARY: &str = "Missing summary";

/// Summary of the finding used when no review comment qualified.
pub const NO_MATCHING_COMMENTS_SUMMARY: &str =
    "Review requested changes, but no matching inline comments were found.";

/// File used when no location is known.
pub const UNKNOWN_FILE: &str = "unknown";

/// One thing remediation should address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    pub summary: String,
}

impl Finding {
    /// Create a finding.
    pub fn new(file: impl Into<String>, line: Option<u64>, summary: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            summary: summary.into(),
        }
    }

    /// Canonical signature of this finding.
    pub fn signature(&self) -> String {
        signature(self)
    }
}

// ============================================================================
// Canonicalization
// ============================================================================

/// Canonical form of free text.
///
/// Lowercases, collapses whitespace runs to a single space, drops every
/// character outside `[a-z0-9:/._ -]` and trims.
///
/// # Examples
///
/// ```
/// use agentfix_core::findings::normalize;
///
/// assert_eq!(normalize("  Null   POINTER\tin Foo()! "), "null pointer in foo");
/// ```
pub fn normalize(text: &str) -> String {
    let collapsed = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    collapsed
        .chars()
        .filter(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || matches!(c, ':' | '/' | '.' | '_' | ' ' | '-')
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// `normalize(file):line-or-0:normalize(summary)` with a leading `fix` or
/// `issue` word removed from the summary.
pub fn signature(finding: &Finding) -> String {
    let summary = normalize(&finding.summary);
    let summary = strip_leading_word(&summary, "fix");
    let summary = strip_leading_word(summary, "issue");

    format!(
        "{}:{}:{}",
        normalize(&finding.file),
        finding.line.unwrap_or(0),
        summary.trim()
    )
}

fn strip_leading_word<'a>(text: &'a str, word: &str) -> &'a str {
    match text.strip_prefix(word) {
        Some(rest) if !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') => rest,
        _ => text,
    }
}

/// Remove findings whose signature was already seen, keeping the first.
///
/// Order is preserved and the operation is idempotent.
pub fn dedupe(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|finding| seen.insert(signature(finding)))
        .collect()
}

// ============================================================================
// Extraction
// ============================================================================

/// Turn inline review comments from allow-listed reviewers into findings.
///
/// Authors are compared case-insensitively. When no comment qualifies, a
/// single placeholder finding is returned so the dispatch still carries the
/// review's intent.
pub fn extract_findings_from_review_comments(
    comments: &[PullRequestReviewComment],
    allowed_authors: &[String],
) -> Vec<Finding> {
    let allowed: HashSet<String> = allowed_authors
        .iter()
        .map(|author| author.trim().to_lowercase())
        .collect();

    let findings: Vec<Finding> = comments
        .iter()
        .filter(|comment| {
            comment
                .author()
                .is_some_and(|login| allowed.contains(&login.to_lowercase()))
        })
        .map(|comment| Finding {
            file: comment
                .path
                .clone()
                .unwrap_or_else(|| UNKNOWN_FILE.to_string()),
            line: comment.effective_line(),
            summary: summarize_comment(&comment.body),
        })
        .collect();

    if findings.is_empty() {
        return vec![Finding::new(UNKNOWN_FILE, None, NO_MATCHING_COMMENTS_SUMMARY)];
    }
    findings
}

/// First non-empty line of a comment, truncated.
pub fn summarize_comment(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(MAX_SUMMARY_CHARS).collect())
        .unwrap_or_else(|| MISSING_SUMMARY.to_string())
}

/// Best guess at the source file named in a rendered stack trace.
///
/// Lines are scanned top to bottom. On each line a `(file:line:col)` location
/// wins over an `at fn file:line:col` one.
pub fn infer_file_from_stack_trace(stack_trace: &str) -> String {
    static PARENTHESIZED: OnceLock<Option<Regex>> = OnceLock::new();
    static BARE: OnceLock<Option<Regex>> = OnceLock::new();

    let parenthesized = PARENTHESIZED
        .get_or_init(|| Regex::new(r"\(([^():]+(?:\.[a-zA-Z0-9]+)?):\d+:\d+\)").ok());
    let bare = BARE.get_or_init(|| {
        Regex::new(r"at\s+[^\s]+\s+([^():]+(?:\.[a-zA-Z0-9]+)?):\d+:\d+").ok()
    });

    stack_trace
        .lines()
        .map(str::trim)
        .find_map(|line| {
            [parenthesized, bare]
                .into_iter()
                .flatten()
                .find_map(|pattern| {
                    pattern
                        .captures(line)
                        .and_then(|captures| captures.get(1))
                        .map(|m| m.as_str().to_string())
                })
                .filter(|file| !file.trim().is_empty())
        })
        .unwrap_or_else(|| UNKNOWN_FILE.to_string())
}

#[cfg(test)]
#[path = "findings_tests.rs"]
mod tests;
