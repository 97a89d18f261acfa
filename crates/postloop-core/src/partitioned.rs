use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::warn;

use postloop_logging::{LogEvent, Logger, LoopMode};
use postloop_provider::{Critic, Generator, Message, PreCheck, ProviderError, TaskSpec};
use postloop_review::{partition_revision_message, PartStats, Severity, Verdict};

use crate::context::IterationState;
use crate::error::LoopError;
use crate::outcome::PartitionedRun;
use crate::DEFAULT_MAX_ITERATIONS;

/// Partitioned reflexion loop for multi-part artifacts. Only pending parts
/// are regenerated each round; parts accepted in an earlier round are
/// preserved untouched. Pass/fail is decided by rule-based scoring over the
/// merged pre-check and critique issues, not by the critic alone.
pub struct PartitionedLoop<'a, A> {
    generator: &'a dyn Generator<A>,
    critic: &'a dyn Critic<BTreeMap<String, A>>,
    precheck: &'a dyn PreCheck<A>,
    logger: Arc<Logger>,
    max_iterations: usize,
    interrupted: Arc<AtomicBool>,
}

impl<'a, A> PartitionedLoop<'a, A>
where
    A: Clone + Send + Sync,
{
    pub fn new(
        generator: &'a dyn Generator<A>,
        critic: &'a dyn Critic<BTreeMap<String, A>>,
        precheck: &'a dyn PreCheck<A>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator,
            critic,
            precheck,
            logger,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Share an externally owned interrupt flag (e.g. wired to Ctrl-C).
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Run the loop over the given part keys. Terminal conditions: the
    /// merged verdict passes, no regeneration target remains, or the budget
    /// is exhausted. Every non-passing terminal returns the best-effort
    /// mapping built so far.
    pub async fn run(
        &self,
        task: &TaskSpec,
        part_keys: &[String],
    ) -> Result<PartitionedRun<A>, LoopError> {
        if self.max_iterations == 0 {
            return Err(LoopError::EmptyBudget);
        }
        if part_keys.is_empty() {
            return Ok(PartitionedRun {
                parts: BTreeMap::new(),
                verdict: Verdict::rule_based(Vec::new()),
                rounds: 0,
                converged: true,
            });
        }

        self.logger.log(&LogEvent::RunStarted {
            mode: LoopMode::Partitioned,
            topic: task.topic.clone(),
            max_iterations: self.max_iterations,
        });

        let mut state: IterationState<BTreeMap<String, A>> = IterationState::new();
        state.pending = part_keys.iter().cloned().collect();
        let mut parts: BTreeMap<String, A> = BTreeMap::new();

        loop {
            // Fan out generation of all pending parts; the pre-check and
            // critique below wait on the join barrier.
            let generated = self.generate_pending(task, &state).await?;
            for (key, artifact, duration_secs) in generated {
                self.logger.log(&LogEvent::GenerationCompleted {
                    attempt: state.attempt,
                    part: Some(key.clone()),
                    duration_secs,
                });
                parts.insert(key, artifact);
            }

            let mut issues = self.precheck.validate(&parts, part_keys);
            self.logger.log(&LogEvent::PrecheckCompleted {
                attempt: state.attempt,
                issues: issues.len(),
            });

            // Qualitative critique runs only over the structurally valid
            // subset; with nothing valid to inspect a conservative default
            // verdict stands in and scoring proceeds from the pre-check
            // issues alone.
            let invalid: BTreeSet<&str> = issues
                .iter()
                .filter(|issue| issue.severity == Severity::Critical)
                .filter_map(|issue| issue.part.key())
                .collect();
            let valid: BTreeMap<String, A> = parts
                .iter()
                .filter(|(key, _)| !invalid.contains(key.as_str()))
                .map(|(key, artifact)| (key.clone(), artifact.clone()))
                .collect();

            let qualitative = if valid.is_empty() {
                Verdict::waived("qualitative critique skipped: no structurally valid parts")
            } else {
                self.logger.log(&LogEvent::CritiqueStarted {
                    attempt: state.attempt,
                });
                self.critic
                    .critique(&valid, task)
                    .await
                    .map_err(LoopError::Critic)?
            };
            issues.extend(qualitative.issues);

            let stats = PartStats {
                expected: part_keys.len(),
                produced: parts.len(),
                valid: valid.len(),
            };
            let verdict = Verdict::rule_based(issues);
            self.logger.log(&LogEvent::CritiqueCompleted {
                attempt: state.attempt,
                passed: verdict.passed,
                score: verdict.score,
                issues: verdict.issues.len(),
            });
            state.last_verdict = Some(verdict.clone());

            let rounds = state.attempt + 1;
            if verdict.passed {
                self.logger.log(&LogEvent::RunConverged {
                    mode: LoopMode::Partitioned,
                    iterations: rounds,
                    score: verdict.score,
                });
                return Ok(PartitionedRun {
                    parts,
                    verdict,
                    rounds,
                    converged: true,
                });
            }

            // Regeneration targets: distinct critical part keys, excluding
            // the "all" sentinel and anything the critic invented.
            let mut next_pending = verdict.critical_parts();
            next_pending.retain(|key| {
                let known = part_keys.contains(key);
                if !known {
                    warn!(part = %key, "critic flagged an unknown part key, ignoring");
                }
                known
            });

            if next_pending.is_empty() {
                // Only non-critical or whole-set issues remain. Warnings
                // alone never trigger another iteration: accept and stop.
                self.logger.log(&LogEvent::RunAccepted {
                    mode: LoopMode::Partitioned,
                    iterations: rounds,
                    score: verdict.score,
                });
                return Ok(PartitionedRun {
                    parts,
                    verdict,
                    rounds,
                    converged: false,
                });
            }

            let exhausted = rounds >= self.max_iterations;
            let interrupted = self.interrupted.load(Ordering::SeqCst);
            if exhausted || interrupted {
                if interrupted {
                    self.logger
                        .log(&LogEvent::RunInterrupted { iterations: rounds });
                } else {
                    self.logger
                        .log(&LogEvent::IterationBudgetExhausted { iterations: rounds });
                }
                return Ok(PartitionedRun {
                    parts,
                    verdict,
                    rounds,
                    converged: false,
                });
            }

            self.logger.log(&LogEvent::PartsPending {
                attempt: state.attempt,
                keys: next_pending.iter().cloned().collect(),
            });
            state.pending = next_pending;
            state.history = vec![Message::user(partition_revision_message(&verdict, &stats))];
            self.logger.log(&LogEvent::FeedbackRecorded {
                attempt: state.attempt,
            });
            state.advance();
        }
    }

    /// Generate all pending parts concurrently and join. Sub-artifacts are
    /// independent; the controller is the single writer that merges results
    /// after the join.
    async fn generate_pending(
        &self,
        task: &TaskSpec,
        state: &IterationState<BTreeMap<String, A>>,
    ) -> Result<Vec<(String, A, f64)>, LoopError> {
        let history: &[Message] = &state.history;

        let futures = state.pending.iter().map(|key| {
            self.logger.log(&LogEvent::GenerationStarted {
                attempt: state.attempt,
                part: Some(key.clone()),
            });
            let prompt = part_prompt(task, key);
            let key = key.clone();
            async move {
                let started = Instant::now();
                let generation = self.generator.generate(&prompt, history).await?;
                Ok::<_, ProviderError>((key, generation.artifact, started.elapsed().as_secs_f64()))
            }
        });

        try_join_all(futures).await.map_err(LoopError::Generator)
    }
}

fn part_prompt(task: &TaskSpec, key: &str) -> String {
    format!("{}\n\nProduce the \"{}\" part of the set.", task.brief, key)
}
