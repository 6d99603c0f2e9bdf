use std::sync::LazyLock;

use regex::Regex;

use crate::db::{Clause, ClauseKind};

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*pre-?requisites?\s*(?:\(s\))?\s*:?\s*").unwrap());
pub static COURSE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]+(?:-[A-Z]+)? \d+").unwrap());

/// Parse a prerequisite sentence into clauses.
///
/// Strips the leading "Prerequisite(s):" label, pulls out every
/// course-code-shaped substring, and tags the whole clause `alternative`
/// when the text contains " or ", else `required`. Known simplification:
/// mixed and/or clauses and exclusions ("not open to students who...") are
/// not modelled; richer prerequisite logic is future work, not implied
/// here.
pub fn parse_prerequisites(text: &str) -> Vec<Clause> {
    let cleaned = LABEL_RE.replace(text.trim(), "");
    let courses: Vec<String> = COURSE_CODE_RE
        .find_iter(&cleaned)
        .map(|m| m.as_str().to_string())
        .collect();
    if courses.is_empty() {
        return Vec::new();
    }

    let kind = if cleaned.to_ascii_lowercase().contains(" or ") {
        ClauseKind::Alternative
    } else {
        ClauseKind::Required
    };

    vec![Clause { kind, courses, credits_required: None }]
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_clause_is_alternative() {
        let clauses = parse_prerequisites("Prerequisite: CSCI-UA 101 or CSCI-UA 102");
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].kind, ClauseKind::Alternative);
        assert_eq!(clauses[0].courses, vec!["CSCI-UA 101", "CSCI-UA 102"]);
    }

    #[test]
    fn comma_clause_is_required() {
        let clauses = parse_prerequisites("Prerequisite: CSCI-UA 101, MATH-UA 120");
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].kind, ClauseKind::Required);
        assert_eq!(clauses[0].courses, vec!["CSCI-UA 101", "MATH-UA 120"]);
    }

    #[test]
    fn empty_and_codeless_text() {
        assert!(parse_prerequisites("").is_empty());
        assert!(parse_prerequisites("Prerequisites: permission of the instructor").is_empty());
    }

    #[test]
    fn label_variants_stripped() {
        for label in ["Prerequisite:", "Prerequisites:", "prerequisite(s):", "PREREQUISITE"] {
            let clauses = parse_prerequisites(&format!("{label} CSCI-UA 101"));
            assert_eq!(clauses[0].courses, vec!["CSCI-UA 101"], "label {label:?}");
        }
    }

    #[test]
    fn case_insensitive_or() {
        let clauses = parse_prerequisites("CSCI-UA 101 OR CSCI-UA 102");
        assert_eq!(clauses[0].kind, ClauseKind::Alternative);
    }
}
