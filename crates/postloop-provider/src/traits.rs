use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use postloop_review::{Issue, Verdict, VerdictParseError};

use crate::message::Message;
use crate::task::TaskSpec;

/// Errors raised by capability adapters. The loop controller propagates
/// these unchanged; retry for the transient variants happens inside the
/// adapter, never in the loop.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by model API")]
    RateLimited,

    #[error("model API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("malformed verdict: {0}")]
    Verdict(#[from] VerdictParseError),

    #[error("failed to encode artifact for review: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to run generation tool: {0}")]
    Tool(#[from] std::io::Error),

    #[error("generation tool exited with code {code}: {stderr}")]
    ToolFailed { code: i32, stderr: String },

    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),
}

impl ProviderError {
    /// Transient failures worth retrying at the adapter level.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::RateLimited => true,
            ProviderError::Api { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// A candidate artifact plus the conversation turns that produced it.
#[derive(Debug, Clone)]
pub struct Generation<A> {
    pub artifact: A,
    pub messages: Vec<Message>,
}

/// Produces a candidate artifact from a prompt and prior conversation.
#[async_trait]
pub trait Generator<A>: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        history: &[Message],
    ) -> Result<Generation<A>, ProviderError>;
}

/// Evaluates a candidate artifact and returns a structured verdict. The
/// verdict's `passed` field is authoritative in single-artifact mode and
/// advisory input to rule-based scoring in partitioned mode. Two critiques
/// of the same artifact may disagree; the loop acts on the latest one.
#[async_trait]
pub trait Critic<A>: Send + Sync {
    async fn critique(&self, artifact: &A, task: &TaskSpec) -> Result<Verdict, ProviderError>;
}

/// Deterministic, model-free structural validation for partitioned
/// artifacts: existence, size and count rules.
pub trait PreCheck<A>: Send + Sync {
    fn validate(&self, parts: &BTreeMap<String, A>, expected: &[String]) -> Vec<Issue>;
}
