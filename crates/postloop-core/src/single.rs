use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use postloop_logging::{LogEvent, Logger, LoopMode};
use postloop_provider::{Critic, Generation, Generator, Message, TaskSpec};
use postloop_review::revision_message;

use crate::context::IterationState;
use crate::error::LoopError;
use crate::outcome::SingleRun;
use crate::DEFAULT_MAX_ITERATIONS;

/// Generic revise instruction for attempts after the first. The itemized
/// feedback is carried in the conversation history, not in the prompt.
pub const REVISE_PROMPT: &str =
    "Revise your previous answer to address the review feedback above. Return the full corrected result.";

/// Single-artifact reflexion loop: generate, critique, revise until the
/// critic passes the artifact or the iteration budget runs out.
pub struct SingleLoop<'a, A> {
    generator: &'a dyn Generator<A>,
    critic: &'a dyn Critic<A>,
    logger: Arc<Logger>,
    max_iterations: usize,
    interrupted: Arc<AtomicBool>,
}

impl<'a, A> SingleLoop<'a, A> {
    pub fn new(
        generator: &'a dyn Generator<A>,
        critic: &'a dyn Critic<A>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator,
            critic,
            logger,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Handle for cooperative cancellation. The flag is checked once per
    /// iteration boundary; the current artifact is returned non-converged.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Share an externally owned interrupt flag (e.g. wired to Ctrl-C).
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Run the loop. The critic's `passed` field is the only success exit;
    /// reaching the budget returns the last produced artifact rather than
    /// an error. Capability failures propagate to the caller.
    pub async fn run(&self, task: &TaskSpec) -> Result<SingleRun<A>, LoopError> {
        if self.max_iterations == 0 {
            return Err(LoopError::EmptyBudget);
        }

        self.logger.log(&LogEvent::RunStarted {
            mode: LoopMode::Single,
            topic: task.topic.clone(),
            max_iterations: self.max_iterations,
        });

        let mut state: IterationState<A> = IterationState::new();

        loop {
            let prompt = state.current_prompt(task);

            self.logger.log(&LogEvent::GenerationStarted {
                attempt: state.attempt,
                part: None,
            });
            let started = Instant::now();
            let Generation { artifact, messages } = self
                .generator
                .generate(&prompt, &state.history)
                .await
                .map_err(LoopError::Generator)?;
            self.logger.log(&LogEvent::GenerationCompleted {
                attempt: state.attempt,
                part: None,
                duration_secs: started.elapsed().as_secs_f64(),
            });

            state.history.extend(messages);

            self.logger.log(&LogEvent::CritiqueStarted {
                attempt: state.attempt,
            });
            let verdict = self
                .critic
                .critique(&artifact, task)
                .await
                .map_err(LoopError::Critic)?;
            self.logger.log(&LogEvent::CritiqueCompleted {
                attempt: state.attempt,
                passed: verdict.passed,
                score: verdict.score,
                issues: verdict.issues.len(),
            });

            state.current = Some(artifact);
            state.last_verdict = Some(verdict.clone());

            let iterations = state.attempt + 1;
            let exhausted = iterations >= self.max_iterations;
            let interrupted = self.interrupted.load(Ordering::SeqCst);

            if verdict.passed || exhausted || interrupted {
                if verdict.passed {
                    self.logger.log(&LogEvent::RunConverged {
                        mode: LoopMode::Single,
                        iterations,
                        score: verdict.score,
                    });
                } else if interrupted {
                    self.logger.log(&LogEvent::RunInterrupted { iterations });
                } else {
                    self.logger
                        .log(&LogEvent::IterationBudgetExhausted { iterations });
                }

                let artifact = state
                    .current
                    .take()
                    .expect("artifact was produced this iteration");
                return Ok(SingleRun {
                    artifact,
                    converged: verdict.passed,
                    verdict,
                    iterations,
                    history: state.history,
                });
            }

            debug!(
                attempt = state.attempt,
                score = verdict.score,
                "Verdict failed, preparing revision"
            );
            state.history.push(Message::user(revision_message(&verdict)));
            self.logger.log(&LogEvent::FeedbackRecorded {
                attempt: state.attempt,
            });
            state.advance();
        }
    }
}
