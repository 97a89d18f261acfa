use std::collections::BTreeSet;

use postloop_provider::{Message, TaskSpec};
use postloop_review::Verdict;

use crate::single::REVISE_PROMPT;

/// Per-run state owned exclusively by the loop controller. Created at loop
/// entry, mutated once per iteration, discarded when the run returns.
/// Capabilities only ever see read-only views of it.
#[derive(Debug, Clone)]
pub struct IterationState<A> {
    /// Current iteration, 0-indexed.
    pub attempt: usize,
    /// Conversation history. Grows monotonically within a single-artifact
    /// run and is never truncated.
    pub history: Vec<Message>,
    /// Last artifact produced by the generator.
    pub current: Option<A>,
    /// Verdict from the most recent critique.
    pub last_verdict: Option<Verdict>,
    /// Part keys still awaiting (re)generation, partitioned mode only.
    pub pending: BTreeSet<String>,
}

impl<A> IterationState<A> {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            history: Vec::new(),
            current: None,
            last_verdict: None,
            pending: BTreeSet::new(),
        }
    }

    pub fn advance(&mut self) {
        self.attempt += 1;
    }

    /// Prompt for the current attempt: the task brief on attempt 0, the
    /// generic revise instruction afterwards (the actual feedback rides in
    /// the history).
    pub fn current_prompt(&self, task: &TaskSpec) -> String {
        if self.attempt == 0 {
            task.brief.clone()
        } else {
            REVISE_PROMPT.to_string()
        }
    }
}

impl<A> Default for IterationState<A> {
    fn default() -> Self {
        Self::new()
    }
}
