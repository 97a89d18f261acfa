//! Turns a verdict into the revision instruction appended to conversation
//! history before the next generation attempt.

use crate::verdict::Verdict;

/// Aggregate counts reported alongside partitioned-mode feedback so the
/// next attempt has situational context beyond the issue list.
#[derive(Debug, Clone, Copy)]
pub struct PartStats {
    pub expected: usize,
    pub produced: usize,
    pub valid: usize,
}

/// Format a revision message from a failed verdict: the summary plus one
/// `[severity] description: suggestion` line per issue.
pub fn revision_message(verdict: &Verdict) -> String {
    let mut lines = vec![
        format!(
            "The previous attempt did not pass review (score {:.1}/100).",
            verdict.score
        ),
        format!("Review summary: {}", verdict.summary),
    ];

    if !verdict.issues.is_empty() {
        lines.push("Issues to address:".to_string());
        for issue in &verdict.issues {
            lines.push(format!(
                "- [{}] {}: {}",
                issue.severity, issue.description, issue.suggestion
            ));
        }
    }

    lines.join("\n")
}

/// Partitioned-mode variant: the plain revision message plus part counts.
pub fn partition_revision_message(verdict: &Verdict, stats: &PartStats) -> String {
    format!(
        "{}\nParts expected: {}, produced: {}, structurally usable: {}",
        revision_message(verdict),
        stats.expected,
        stats.produced,
        stats.valid
    )
}
