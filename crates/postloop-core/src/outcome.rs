use std::collections::BTreeMap;

use postloop_provider::Message;
use postloop_review::Verdict;

/// Result of a single-artifact run. The artifact is always present once
/// one generation succeeded: budget exhaustion degrades gracefully to the
/// last produced candidate instead of failing.
#[derive(Debug, Clone)]
pub struct SingleRun<A> {
    pub artifact: A,
    pub verdict: Verdict,
    pub iterations: usize,
    /// True when the critic passed the artifact; false when the run was
    /// cut short by the budget or an interrupt.
    pub converged: bool,
    /// Final conversation history, returned to the caller as plain data.
    pub history: Vec<Message>,
}

/// Result of a partitioned run: the best-effort part mapping plus the
/// final merged rule-based verdict.
#[derive(Debug, Clone)]
pub struct PartitionedRun<A> {
    pub parts: BTreeMap<String, A>,
    pub verdict: Verdict,
    pub rounds: usize,
    pub converged: bool,
}
