//! Chat completion transport.
//!
//! Speaks the OpenAI-style `/chat/completions` shape used by OpenRouter:
//! one user message in, the first choice's content out.

use super::{CompletionProvider, InferenceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Settings for the chat completion endpoint.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Sent as `HTTP-Referer` when present.
    pub referer: Option<String>,
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "anthropic/claude-3-opus-20240229".to_string(),
            referer: Some("https://alarmsus.com".to_string()),
            timeout_seconds: 30,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("referer", &self.referer)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for a hosted chat completion endpoint.
///
/// Cheap to share: the underlying connection pool is reference counted.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    config: ClientConfig,
    http_client: reqwest::Client,
    endpoint: String,
}

impl ChatCompletionClient {
    pub fn new(config: ClientConfig) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| InferenceError::Client(e.to_string()))?;

        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(Self {
            config,
            http_client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("POST {} ({} prompt bytes)", self.endpoint, prompt.len());

        let mut builder = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request);

        if let Some(ref referer) = self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(self.config.timeout_seconds)
            } else if e.is_connect() {
                InferenceError::Connect(self.config.base_url.clone())
            } else {
                InferenceError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(self.config.timeout_seconds)
            } else {
                InferenceError::Decode(e.to_string())
            }
        })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or(InferenceError::EmptyResponse)?;

        Ok(choice.message.content.unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
