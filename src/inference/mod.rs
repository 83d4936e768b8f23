//! Text completion capability used by the signal analyzers.
//!
//! The scoring pipeline only depends on [`CompletionProvider`]; the
//! HTTP transport in [`client`] is one implementation of it.

pub mod client;

pub use client::{ChatCompletionClient, ClientConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Failure to obtain a completion from the upstream service.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to inference endpoint at {0}")]
    Connect(String),

    #[error("failed to send request: {0}")]
    Request(String),

    #[error("inference API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse inference response: {0}")]
    Decode(String),

    #[error("inference response contained no choices")]
    EmptyResponse,
}

/// Prompt in, text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Requests a single completion for `prompt` and returns its text.
    async fn complete(&self, prompt: &str) -> Result<String, InferenceError>;

    /// Model identifier, for run metadata.
    fn model_name(&self) -> &str;
}
