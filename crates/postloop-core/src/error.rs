use thiserror::Error;

use postloop_provider::ProviderError;

/// Errors surfaced by a loop run. Capability failures are propagated
/// unchanged apart from recording which role raised them; a caller-level
/// retry policy is expected to wrap the whole run, not individual
/// iterations. Convergence exhaustion is not an error.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("generator capability failed: {0}")]
    Generator(#[source] ProviderError),

    #[error("critic capability failed: {0}")]
    Critic(#[source] ProviderError),

    #[error("iteration budget must be at least 1")]
    EmptyBudget,
}
