//! OpenAI-compatible chat-completion provider.
//!
//! Speaks the `POST {base_url}/chat/completions` protocol, so any
//! compatible endpoint works.
//!
//! ## Security
//!
//! The API key is stored as an [`ApiCredential`] and exposed only when the
//! `Authorization` header is built.

use super::{
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default API root.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completion provider.
///
/// No request timeout is set here: the call inherits the client default.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a provider from a raw API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "OpenAI API key",
        ))
    }

    /// Create a provider from an already-loaded credential.
    pub fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// The API root requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Chat-completion request format.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat-completion response format. Every field is optional upstream-side.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Text of an error response; a failed read becomes a marker, not "".
fn error_body<E: std::fmt::Display>(read: Result<String, E>) -> String {
    read.unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.credential.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "{} is empty",
                self.credential.name()
            )));
        }

        let request = ChatCompletionRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        // SECURITY: Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = error_body(response.text().await);
            tracing::debug!(status = status.as_u16(), body = %body, "Upstream returned an error status");
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: body.model.unwrap_or_else(|| config.model.clone()),
        })
    }

    async fn health_check(&self) -> bool {
        // Verify the key is set, without logging it
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAiProvider::new("test-key");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url(), DEFAULT_OPENAI_BASE_URL);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OpenAiProvider::new("k").with_base_url("http://localhost:9000/v1/");
        assert_eq!(provider.base_url(), "http://localhost:9000/v1");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let request = ChatCompletionRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            temperature: 0.3,
            max_tokens: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let body: ChatCompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(body.choices.is_empty());

        let body: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(body.choices[0].message.as_ref().unwrap().content.is_none());
    }

    #[test]
    fn test_error_body_keeps_read_failure() {
        assert_eq!(error_body::<String>(Ok("quota".to_string())), "quota");

        let body = error_body::<String>(Err("connection reset".to_string()));
        assert!(body.contains("unreadable body"));
        assert!(body.contains("connection reset"));
    }

    // ==================== SECURITY TESTS ====================

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-super-secret-key-12345";
        let provider = OpenAiProvider::new(secret_key);

        let debug_output = format!("{:?}", provider);

        assert!(
            !debug_output.contains(secret_key),
            "API key was exposed in Debug output!"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_reflects_credential() {
        assert!(OpenAiProvider::new("sk-key").health_check().await);
        assert!(!OpenAiProvider::new("").health_check().await);
    }

    #[tokio::test]
    async fn test_empty_key_is_not_configured() {
        let provider = OpenAiProvider::new("");
        let result = provider
            .complete(vec![ChatMessage::user("x")], &CompletionConfig::default())
            .await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }
}
