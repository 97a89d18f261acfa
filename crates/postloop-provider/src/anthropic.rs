use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use postloop_review::Verdict;

use crate::message::Message;
use crate::retry::RetryPolicy;
use crate::task::TaskSpec;
use crate::traits::{Critic, Generation, Generator, ProviderError};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Retrying client for the Anthropic messages API. One instance is shared
/// by every model-backed capability in a run.
pub struct ModelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryPolicy::default(),
        }
    }

    /// Read the API key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| ProviderError::MissingApiKey(API_KEY_ENV))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send one completion request, retrying transient failures with
    /// exponential backoff.
    pub async fn complete(
        &self,
        system: &str,
        messages: &[Message],
    ) -> Result<String, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.send(system, messages).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        error = %err,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "Retrying model request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send(&self, system: &str, messages: &[Message]) -> Result<String, ProviderError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages,
        };

        debug!(model = %self.model, messages = messages.len(), "Sending model request");

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response.json().await?;
        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(ProviderError::MalformedOutput(
                "model reply contained no text blocks".to_string(),
            ));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Extract a typed JSON value from a model reply: a fenced ```json block
/// if present, otherwise the span from the first `{` to the last `}`.
pub fn extract_json<T: DeserializeOwned>(output: &str) -> Result<T, ProviderError> {
    let candidate = if let Some(start) = output.find("```json") {
        let body = &output[start + "```json".len()..];
        match body.find("```") {
            Some(end) => body[..end].trim(),
            None => {
                return Err(ProviderError::MalformedOutput(
                    "unterminated json fence".to_string(),
                ))
            }
        }
    } else {
        let start = output.find('{');
        let end = output.rfind('}');
        match (start, end) {
            (Some(start), Some(end)) if start < end => &output[start..=end],
            _ => {
                return Err(ProviderError::MalformedOutput(
                    "no JSON object in model reply".to_string(),
                ))
            }
        }
    };

    serde_json::from_str(candidate).map_err(|err| ProviderError::MalformedOutput(err.to_string()))
}

/// Generator that prompts the model and parses a typed JSON artifact from
/// the reply.
pub struct ModelGenerator<T> {
    client: Arc<ModelClient>,
    system: String,
    _artifact: PhantomData<fn() -> T>,
}

impl<T> ModelGenerator<T> {
    pub fn new(client: Arc<ModelClient>, system: impl Into<String>) -> Self {
        Self {
            client,
            system: system.into(),
            _artifact: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Generator<T> for ModelGenerator<T>
where
    T: DeserializeOwned + Send + Sync,
{
    async fn generate(
        &self,
        prompt: &str,
        history: &[Message],
    ) -> Result<Generation<T>, ProviderError> {
        let mut messages = history.to_vec();
        messages.push(Message::user(prompt));

        let reply = self.client.complete(&self.system, &messages).await?;
        let artifact = extract_json(&reply)?;

        Ok(Generation {
            artifact,
            messages: vec![Message::user(prompt), Message::assistant(reply)],
        })
    }
}

const VERDICT_FORMAT: &str = r#"Respond with your reasoning, then end with a verdict block:

<verdict>
{"passed": true|false, "score": 0-100, "issues": [{"type": "...", "severity": "critical|warning|info", "part": "<part key or \"all\">", "description": "...", "suggestion": "..."}], "summary": "..."}
</verdict>

Allowed issue types: style_mismatch, text_unreadable, off_topic, missing_detail, unsupported_claim, weak_hook, format_invalid."#;

/// Critic that serializes the artifact, asks the model for a verdict block
/// and validates it at the boundary.
pub struct ModelCritic {
    client: Arc<ModelClient>,
    system: String,
}

impl ModelCritic {
    pub fn new(client: Arc<ModelClient>, system: impl Into<String>) -> Self {
        Self {
            client,
            system: system.into(),
        }
    }
}

#[async_trait]
impl<A> Critic<A> for ModelCritic
where
    A: Serialize + Send + Sync,
{
    async fn critique(&self, artifact: &A, task: &TaskSpec) -> Result<Verdict, ProviderError> {
        let payload = serde_json::to_string_pretty(artifact).map_err(ProviderError::Encode)?;

        let prompt = format!(
            "## Task\nTopic: {}\nAudience: {}\n\n## Artifact under review\n```json\n{}\n```\n\n{}",
            task.topic, task.audience, payload, VERDICT_FORMAT
        );

        let reply = self
            .client
            .complete(&self.system, &[Message::user(prompt)])
            .await?;
        Ok(Verdict::parse(&reply)?)
    }
}
