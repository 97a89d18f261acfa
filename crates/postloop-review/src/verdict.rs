use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::issue::{Issue, PartRef, Severity};
use crate::scoring;

/// Score substituted when the qualitative critique cannot run (no
/// structurally valid parts to inspect).
const WAIVED_SCORE: f64 = 80.0;

/// Structured critic output: pass/fail, score, itemized issues, summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<Issue>,
    pub summary: String,
}

#[derive(Error, Debug)]
pub enum VerdictParseError {
    #[error("no verdict found in critic output")]
    NoVerdictFound,

    #[error("malformed verdict block")]
    MalformedBlock,

    #[error("failed to parse verdict JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("verdict score {0} is outside [0, 100]")]
    ScoreOutOfRange(f64),
}

impl Verdict {
    /// Parse a verdict from raw critic output.
    ///
    /// Accepted forms, tried in order:
    /// ```text
    /// <verdict>
    /// {"passed": false, "score": 55.0, "issues": [...], "summary": "..."}
    /// </verdict>
    /// ```
    /// then a fenced ```json block, then a bare JSON object spanning the
    /// first `{` to the last `}`.
    pub fn parse(output: &str) -> Result<Self, VerdictParseError> {
        debug!(output_len = output.len(), "Parsing critic verdict");

        let verdict = if let Some(block) = Self::extract_tagged_block(output)? {
            serde_json::from_str(block)?
        } else if let Some(fenced) = Self::extract_fenced_json(output) {
            serde_json::from_str(fenced)?
        } else if let Some(bare) = Self::extract_bare_object(output) {
            serde_json::from_str(bare)?
        } else {
            return Err(VerdictParseError::NoVerdictFound);
        };

        Self::validate(&verdict)?;
        Ok(verdict)
    }

    fn extract_tagged_block(output: &str) -> Result<Option<&str>, VerdictParseError> {
        let start = output.find("<verdict>");
        let end = output.find("</verdict>");
        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                Ok(Some(output[start + "<verdict>".len()..end].trim()))
            }
            (Some(_), Some(_)) | (Some(_), None) => Err(VerdictParseError::MalformedBlock),
            _ => Ok(None),
        }
    }

    fn extract_fenced_json(output: &str) -> Option<&str> {
        let start = output.find("```json")?;
        let body = &output[start + "```json".len()..];
        let end = body.find("```")?;
        Some(body[..end].trim())
    }

    fn extract_bare_object(output: &str) -> Option<&str> {
        let start = output.find('{')?;
        let end = output.rfind('}')?;
        if start < end {
            Some(&output[start..=end])
        } else {
            None
        }
    }

    fn validate(verdict: &Verdict) -> Result<(), VerdictParseError> {
        if !(0.0..=100.0).contains(&verdict.score) {
            return Err(VerdictParseError::ScoreOutOfRange(verdict.score));
        }
        Ok(())
    }

    /// Build a verdict from a merged issue list under rule-based scoring.
    /// This is the partitioned-mode path where the controller, not the
    /// critic, decides pass/fail.
    pub fn rule_based(issues: Vec<Issue>) -> Self {
        let card = scoring::score(&issues);
        Self {
            passed: card.passed,
            score: card.score,
            summary: scoring::summarize(&card, &issues),
            issues,
        }
    }

    /// Conservative stand-in when the qualitative critique cannot run.
    /// Passes at a moderate score and contributes no issues; the structural
    /// pre-check findings still drive the final rule-based decision.
    pub fn waived(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            score: WAIVED_SCORE,
            issues: Vec::new(),
            summary: reason.into(),
        }
    }

    pub fn has_critical(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Critical)
    }

    /// Distinct part keys flagged critical, excluding the `"all"` sentinel.
    /// These are the regeneration targets for the next iteration.
    pub fn critical_parts(&self) -> BTreeSet<String> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Critical)
            .filter_map(|issue| match &issue.part {
                PartRef::All => None,
                PartRef::Key(key) => Some(key.clone()),
            })
            .collect()
    }
}
