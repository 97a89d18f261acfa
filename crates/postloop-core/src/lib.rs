mod context;
mod error;
mod outcome;
mod partitioned;
mod single;

pub use context::IterationState;
pub use error::LoopError;
pub use outcome::{PartitionedRun, SingleRun};
pub use partitioned::PartitionedLoop;
pub use single::{SingleLoop, REVISE_PROMPT};

use std::sync::Arc;

use postloop_logging::Logger;
use postloop_provider::{Critic, Generator, PreCheck, TaskSpec};

/// Default iteration budget when the caller does not set one.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Drive one artifact through generate-critique-revise cycles.
pub async fn run_single<A>(
    generator: &dyn Generator<A>,
    critic: &dyn Critic<A>,
    logger: Arc<Logger>,
    task: &TaskSpec,
    max_iterations: usize,
) -> Result<SingleRun<A>, LoopError> {
    SingleLoop::new(generator, critic, logger)
        .with_max_iterations(max_iterations)
        .run(task)
        .await
}

/// Drive a multi-part artifact through the loop, regenerating only the
/// parts flagged critical each round.
pub async fn run_partitioned<A>(
    generator: &dyn Generator<A>,
    critic: &dyn Critic<std::collections::BTreeMap<String, A>>,
    precheck: &dyn PreCheck<A>,
    logger: Arc<Logger>,
    task: &TaskSpec,
    part_keys: &[String],
    max_iterations: usize,
) -> Result<PartitionedRun<A>, LoopError>
where
    A: Clone + Send + Sync,
{
    PartitionedLoop::new(generator, critic, precheck, logger)
        .with_max_iterations(max_iterations)
        .run(task, part_keys)
        .await
}
