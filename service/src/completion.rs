//! OpenAI-compatible chat completion client.
//!
//! The study's chat assistant runs through `POST /api/openai`; this client
//! forwards the conversation to `{base_url}/chat/completions` and hands the
//! first choice's message back unchanged.

use std::time::Duration;
use std::time::Instant;

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;

use crate::config::OpenAiConfig;

/// OpenAI-compatible chat completion message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Per-request sampling overrides. Absent fields use the configured values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct CompletionOverrides {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

/// Chat completion response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

// Upstream sends `"content": null` for tool-call turns.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: HTTP {status} - {body}")]
    Server { status: u16, body: String },

    #[error("Empty response")]
    EmptyResponse,
}

/// Client for the upstream completion endpoint
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    config: OpenAiConfig,
}

impl CompletionClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send `messages` and return the assistant's reply.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        overrides: CompletionOverrides,
    ) -> Result<ChatMessage, CompletionError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: overrides.temperature.unwrap_or(self.config.temperature),
            top_p: overrides.top_p.unwrap_or(self.config.top_p),
            max_tokens: overrides.max_tokens.unwrap_or(self.config.max_tokens),
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(CompletionError::EmptyResponse)?;

        tracing::debug!(
            model = %self.config.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "completion received"
        );

        Ok(ChatMessage {
            role: message.role,
            content: message.content.unwrap_or_default(),
        })
    }
}
