/// LLM Client: the single point of entry for all completion-service calls.
///
/// No other module talks to the completion service over HTTP directly. Handlers and
/// pipelines depend on the `CompletionService` trait so tests can swap in a fake.
///
/// The service speaks the OpenAI-compatible `chat/completions` protocol, both as a
/// single JSON response and as a `text/event-stream` of deltas.
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Config;

pub mod sse;
pub mod streaming;

pub use self::streaming::{relay_fragments, StreamEvent};

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Stream receiver closed before the completion finished")]
    ChannelClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the ordered message list sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single completion call. Built fresh per call and serialized as the request body.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            max_tokens,
            stream: false,
        }
    }
}

/// The completion gateway seam. `LlmClient` is the production implementation.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Single-shot: returns the full response text, or `EmptyContent` if there is none.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    /// Streaming: forwards each non-empty fragment on `tx`, then one `StreamEvent::Done`
    /// carrying the full text. On a mid-stream failure a `StreamEvent::Failed` is sent
    /// instead of `Done` and the error is returned.
    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunkBody {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if it carries any non-blank content.
    fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
    }
}

/// HTTP client for the completion service.
/// Credentials come from `Config`; the inner `reqwest::Client` pools connections.
///
/// Only single-shot calls carry the overall request timeout. A stream may run as long
/// as the upstream keeps producing.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
    retry_base_delay: Duration,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key: config.completion_api_key.clone(),
            base_url: config.completion_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn post(&self, body: &CompletionRequest) -> reqwest::RequestBuilder {
        self.client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    /// Retries on 429 (rate limit), 5xx and transport errors with exponential backoff.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let request = CompletionRequest {
            stream: false,
            ..request
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = self.retry_base_delay * (1 << (attempt - 1));
                warn!(
                    "Completion attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let sent = self
                .post(&request)
                .timeout(self.request_timeout)
                .send()
                .await;
            let response = match sent {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                warn!("Completion API rate limited the request (attempt {})", attempt + 1);
                last_error = Some(LlmError::RateLimited { retries: attempt });
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Completion API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
            }

            let parsed: ChatCompletionResponse = response.json().await?;

            if let Some(usage) = &parsed.usage {
                debug!(
                    "Completion succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                    request.model, usage.prompt_tokens, usage.completion_tokens
                );
            }

            return parsed.into_text().ok_or(LlmError::EmptyContent);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            stream: true,
            ..request
        };
        debug!("Opening completion stream: model={}", request.model);

        let response = match self.post(&request).send().await {
            Ok(r) => r,
            Err(e) => return Err(fail_stream(&tx, LlmError::Http(e)).await),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(body),
            };
            return Err(fail_stream(&tx, err).await);
        }

        let mut decoder = sse::SseDecoder::default();
        let fragments = response
            .bytes_stream()
            .map(move |chunk| -> Vec<Result<String, LlmError>> {
                match chunk {
                    Ok(bytes) => decoder
                        .push(&bytes)
                        .into_iter()
                        .filter_map(|data| parse_stream_payload(&data).transpose())
                        .collect(),
                    Err(e) => vec![Err(LlmError::Http(e))],
                }
            })
            .flat_map(stream::iter);

        relay_fragments(fragments, &tx).await
    }
}

/// Reports a failure that happened before any fragment was produced.
async fn fail_stream(tx: &mpsc::Sender<StreamEvent>, err: LlmError) -> LlmError {
    let _ = tx.send(StreamEvent::Failed(err.to_string())).await;
    err
}

/// Interprets one SSE `data:` payload from a chat completion stream.
/// Returns `Ok(None)` for the `[DONE]` sentinel and for chunks without text.
fn parse_stream_payload(data: &str) -> Result<Option<String>, LlmError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(None);
    }

    let chunk: StreamChunkBody = serde_json::from_str(data)?;
    if let Some(err) = chunk.error {
        return Err(LlmError::Stream(err.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content))
}

/// Extracts `error.message` from an upstream error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}
