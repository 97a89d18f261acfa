use serde::{Deserialize, Serialize};

/// Severity of a review issue. Determines scoring weight and whether the
/// flagged part is eligible for regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Closed set of issue tags. Structural kinds come from the pre-check,
/// qualitative kinds from the critic. Unknown tags fail deserialization at
/// the capability boundary instead of flowing into scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FileMissing,
    FileTooSmall,
    CountInsufficient,
    StyleMismatch,
    TextUnreadable,
    OffTopic,
    MissingDetail,
    UnsupportedClaim,
    WeakHook,
    FormatInvalid,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            IssueKind::FileMissing => "file_missing",
            IssueKind::FileTooSmall => "file_too_small",
            IssueKind::CountInsufficient => "count_insufficient",
            IssueKind::StyleMismatch => "style_mismatch",
            IssueKind::TextUnreadable => "text_unreadable",
            IssueKind::OffTopic => "off_topic",
            IssueKind::MissingDetail => "missing_detail",
            IssueKind::UnsupportedClaim => "unsupported_claim",
            IssueKind::WeakHook => "weak_hook",
            IssueKind::FormatInvalid => "format_invalid",
        };
        write!(f, "{}", tag)
    }
}

/// Which part of the artifact an issue refers to. Serializes as the part
/// key string, with `"all"` as the whole-artifact sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PartRef {
    All,
    Key(String),
}

impl PartRef {
    pub fn key(&self) -> Option<&str> {
        match self {
            PartRef::All => None,
            PartRef::Key(key) => Some(key),
        }
    }
}

impl Default for PartRef {
    fn default() -> Self {
        PartRef::All
    }
}

impl From<String> for PartRef {
    fn from(value: String) -> Self {
        if value == "all" {
            PartRef::All
        } else {
            PartRef::Key(value)
        }
    }
}

impl From<&str> for PartRef {
    fn from(value: &str) -> Self {
        PartRef::from(value.to_string())
    }
}

impl From<PartRef> for String {
    fn from(part: PartRef) -> Self {
        match part {
            PartRef::All => "all".to_string(),
            PartRef::Key(key) => key,
        }
    }
}

impl std::fmt::Display for PartRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartRef::All => write!(f, "all"),
            PartRef::Key(key) => write!(f, "{}", key),
        }
    }
}

/// A single defect flagged by the critic or the pre-check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    #[serde(default)]
    pub part: PartRef,
    pub description: String,
    pub suggestion: String,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        part: impl Into<PartRef>,
        description: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            part: part.into(),
            description: description.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Shorthand for a critical issue, the only severity that triggers
    /// part regeneration.
    pub fn critical(
        kind: IssueKind,
        part: impl Into<PartRef>,
        description: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::new(kind, Severity::Critical, part, description, suggestion)
    }
}
