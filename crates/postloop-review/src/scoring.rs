//! Rule-based scoring for merged issue lists.
//!
//! Used in partitioned mode, where the controller rather than the critic
//! decides pass/fail. Deterministic and order-independent: permuting the
//! issue list never changes the result.

use crate::issue::{Issue, Severity};

/// Minimum score required to pass, in addition to having zero criticals.
pub const PASS_THRESHOLD: f64 = 60.0;

const CRITICAL_PENALTY: f64 = 25.0;
const WARNING_PENALTY: f64 = 10.0;
const INFO_PENALTY: f64 = 5.0;

/// Outcome of rule-based scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreCard {
    pub score: f64,
    pub passed: bool,
}

/// Score an issue list: start at 100, subtract 25 per critical, 10 per
/// warning, 5 per info, clamp to `[0, 100]`. Passing requires the score to
/// reach [`PASS_THRESHOLD`] and zero critical issues. Total: an empty list
/// yields `(100, true)`.
pub fn score(issues: &[Issue]) -> ScoreCard {
    let mut score = 100.0;
    let mut has_critical = false;

    for issue in issues {
        score -= match issue.severity {
            Severity::Critical => {
                has_critical = true;
                CRITICAL_PENALTY
            }
            Severity::Warning => WARNING_PENALTY,
            Severity::Info => INFO_PENALTY,
        };
    }

    let score = score.clamp(0.0, 100.0);
    ScoreCard {
        score,
        passed: score >= PASS_THRESHOLD && !has_critical,
    }
}

/// Render the summary line for a rule-based verdict.
pub fn summarize(card: &ScoreCard, issues: &[Issue]) -> String {
    if card.passed {
        return format!("Review passed with score {:.1}", card.score);
    }

    let criticals = issues
        .iter()
        .filter(|i| i.severity == Severity::Critical)
        .count();
    let warnings = issues
        .iter()
        .filter(|i| i.severity == Severity::Warning)
        .count();

    let mut parts = vec![format!("Review failed with score {:.1}", card.score)];
    if criticals > 0 {
        parts.push(format!("{} critical issue(s)", criticals));
    }
    if warnings > 0 {
        parts.push(format!("{} warning(s)", warnings));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueKind;

    fn issue(severity: Severity) -> Issue {
        Issue::new(
            IssueKind::StyleMismatch,
            severity,
            "all",
            "style drifts from the brief",
            "match the reference style",
        )
    }

    #[test]
    fn test_empty_list_is_perfect_pass() {
        let card = score(&[]);
        assert_eq!(card.score, 100.0);
        assert!(card.passed);
    }

    #[test]
    fn test_single_critical_scores_75_and_fails() {
        let card = score(&[issue(Severity::Critical)]);
        assert_eq!(card.score, 75.0);
        assert!(!card.passed);
    }

    #[test]
    fn test_three_warnings_pass_at_70() {
        let issues = vec![
            issue(Severity::Warning),
            issue(Severity::Warning),
            issue(Severity::Warning),
        ];
        let card = score(&issues);
        assert_eq!(card.score, 70.0);
        assert!(card.passed);
    }

    #[test]
    fn test_high_score_with_critical_still_fails() {
        // 100 - 25 = 75 >= 60, but the critical alone blocks the pass.
        let card = score(&[issue(Severity::Critical)]);
        assert!(card.score >= PASS_THRESHOLD);
        assert!(!card.passed);
    }

    #[test]
    fn test_score_clamps_to_zero() {
        let issues: Vec<Issue> = (0..6).map(|_| issue(Severity::Critical)).collect();
        let card = score(&issues);
        assert_eq!(card.score, 0.0);
        assert!(!card.passed);
    }

    #[test]
    fn test_order_independence() {
        let mut issues = vec![
            issue(Severity::Critical),
            issue(Severity::Warning),
            issue(Severity::Info),
            issue(Severity::Warning),
        ];
        let forward = score(&issues);
        issues.reverse();
        let backward = score(&issues);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_summary_reports_counts() {
        let issues = vec![issue(Severity::Critical), issue(Severity::Warning)];
        let card = score(&issues);
        let summary = summarize(&card, &issues);
        assert!(summary.contains("1 critical"));
        assert!(summary.contains("1 warning"));
    }
}
