mod feedback;
mod issue;
pub mod scoring;
mod verdict;

pub use feedback::{partition_revision_message, revision_message, PartStats};
pub use issue::{Issue, IssueKind, PartRef, Severity};
pub use scoring::{score, summarize, ScoreCard, PASS_THRESHOLD};
pub use verdict::{Verdict, VerdictParseError};
