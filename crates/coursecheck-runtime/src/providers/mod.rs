//! LLM provider abstraction.
//!
//! The gateway only needs one thing from a provider: a single text message
//! back for a list of chat messages. Which model serves it is irrelevant.
//!
//! ## Security
//!
//! Providers hold their key as an [`ApiCredential`]; see [`secrets`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod openai;
pub mod secrets;

pub use openai::{OpenAiProvider, DEFAULT_OPENAI_BASE_URL, OPENAI_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};

/// Highest sampling temperature the gateway will send upstream.
pub const MAX_TEMPERATURE: f32 = 0.3;

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Upstream answered with a non-2xx status; `message` is the raw body.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Configuration for a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Sampling temperature, kept low for repeatable verdicts
    pub temperature: f32,

    /// Maximum tokens to generate (upstream default when `None`)
    pub max_tokens: Option<u32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: MAX_TEMPERATURE,
            max_tokens: None,
        }
    }
}

impl CompletionConfig {
    /// Create a config for the given model with default sampling.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Clamp the temperature into `0.0..=MAX_TEMPERATURE`.
    pub fn clamped(mut self) -> Self {
        let clamped = if self.temperature.is_nan() {
            MAX_TEMPERATURE
        } else {
            self.temperature.clamp(0.0, MAX_TEMPERATURE)
        };
        if clamped != self.temperature {
            tracing::warn!(
                requested = self.temperature,
                applied = clamped,
                "Temperature out of range, clamping"
            );
        }
        self.temperature = clamped;
        self
    }
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text of the first choice; empty when upstream returned none
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// The gateway issues exactly one `complete` call per inbound request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is usable (credential present).
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;
}
