//! Validation Gateway: the stateless HTTP front of the pipeline.
//!
//! # Request Flow
//! 1. Method check (POST only, OPTIONS answered for CORS)
//! 2. Body check (`answer` and `rule` required)
//! 3. Verification policy
//! 4. Credential check
//! 5. One upstream chat completion
//! 6. Fence stripping, JSON parse, normalization
//!
//! Configuration is fixed at construction. Request handling never reads the
//! process environment and holds no mutable state, so any number of
//! requests run concurrently.

mod error;
mod routes;

use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use coursecheck_core::{
    build_prompt, normalize, parse_model_output, ValidationRequest, ValidationResult,
    SYSTEM_INSTRUCTION,
};
use serde_json::Value as JsonValue;
use tokio::net::TcpListener;

use crate::providers::{
    ApiCredential, ChatMessage, CompletionConfig, LlmProvider, OpenAiProvider, ProviderError,
    DEFAULT_OPENAI_BASE_URL,
};
use crate::verification::{check_token, HumanVerifier, VerificationPolicy};

pub use error::{ErrorBody, GatewayError};

/// Path of the validation endpoint.
pub const VALIDATE_PATH: &str = "/validateAnswerAI";

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Body field carrying the client's verification token.
pub const VERIFICATION_TOKEN_FIELD: &str = "verificationToken";

/// Gateway configuration, built once at startup.
#[derive(Debug)]
pub struct GatewayConfig {
    /// Address to listen on (e.g. "0.0.0.0:8080")
    pub bind_addr: String,

    /// Model and sampling settings for the upstream call
    pub completion: CompletionConfig,

    /// Root of the chat-completion API
    pub upstream_base_url: String,

    /// Upstream credential; `None` makes every validation fail with
    /// `ServerMisconfigured`
    pub credential: Option<ApiCredential>,

    /// What to do when bot verification fails
    pub verification: VerificationPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            completion: CompletionConfig::default(),
            upstream_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            credential: None,
            verification: VerificationPolicy::default(),
        }
    }
}

/// The validation gateway. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

struct GatewayState {
    provider: Option<Arc<dyn LlmProvider>>,
    verifier: Option<Arc<dyn HumanVerifier>>,
    policy: VerificationPolicy,
    completion: CompletionConfig,
    bind_addr: String,
}

impl Gateway {
    /// Start building a gateway from its configuration.
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// Whether an upstream provider is available.
    pub fn upstream_configured(&self) -> bool {
        self.state.provider.is_some()
    }

    /// Whether the upstream provider reports itself usable.
    pub async fn upstream_healthy(&self) -> bool {
        match &self.state.provider {
            Some(provider) => provider.health_check().await,
            None => false,
        }
    }

    /// Completion settings actually sent upstream (after clamping).
    pub fn completion_config(&self) -> &CompletionConfig {
        &self.state.completion
    }

    /// The axum router serving the gateway endpoints.
    pub fn router(&self) -> Router {
        routes::router(self.clone())
    }

    /// Bind the configured address and serve until the process stops.
    pub async fn serve(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.state.bind_addr.as_str()).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!(
            addr = %listener.local_addr()?,
            upstream_configured = self.upstream_configured(),
            enforce_verification = self.state.policy.enforce_verification,
            "Validation gateway listening"
        );
        axum::serve(listener, self.router().into_make_service()).await
    }

    /// Handle one raw HTTP call: method check, body extraction,
    /// verification, then [`Gateway::validate`].
    ///
    /// OPTIONS is answered by the router before reaching this point.
    pub async fn handle(
        &self,
        method: &Method,
        body: &[u8],
    ) -> Result<ValidationResult, GatewayError> {
        if method != Method::POST {
            tracing::warn!(method = %method, "Rejected non-POST validation call");
            return Err(GatewayError::MethodNotAllowed(method.to_string()));
        }

        let payload: JsonValue = serde_json::from_slice(body).unwrap_or(JsonValue::Null);

        let request = ValidationRequest::from_json(&payload).map_err(|e| {
            tracing::warn!(error = %e, "Rejected invalid validation request");
            GatewayError::from(e)
        })?;

        let token = payload
            .get(VERIFICATION_TOKEN_FIELD)
            .and_then(JsonValue::as_str);
        let outcome = check_token(self.state.verifier.as_deref(), token).await;
        if !self.state.policy.admits(&outcome) {
            return Err(GatewayError::VerificationFailed);
        }

        self.validate(&request).await
    }

    /// Run one validated request through the upstream model.
    pub async fn validate(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationResult, GatewayError> {
        request.validate()?;

        let provider = self.state.provider.as_ref().ok_or_else(|| {
            tracing::error!("Upstream API key missing from gateway configuration");
            GatewayError::ServerMisconfigured("upstream API key not configured".to_string())
        })?;

        let prompt = build_prompt(request.question(), &request.answer, &request.rule);
        let messages = vec![ChatMessage::system(SYSTEM_INSTRUCTION), ChatMessage::user(prompt)];

        let response = provider
            .complete(messages, &self.state.completion)
            .await
            .map_err(|e| match e {
                ProviderError::ApiError { status, message } => {
                    tracing::error!(
                        provider = provider.name(),
                        status,
                        body = %message,
                        "Upstream HTTP error"
                    );
                    GatewayError::UpstreamError {
                        status,
                        body: message,
                    }
                }
                other => {
                    tracing::error!(
                        provider = provider.name(),
                        error = %other,
                        "Upstream call failed"
                    );
                    GatewayError::Unhandled(other.to_string())
                }
            })?;

        tracing::debug!(
            model = %response.model,
            tokens = response.usage.total(),
            "Upstream completion received"
        );

        let parsed = parse_model_output(&response.content).map_err(|e| {
            tracing::error!(raw = %e.raw(), error = %e, "Invalid JSON returned by upstream");
            GatewayError::InvalidUpstreamFormat {
                raw: e.raw().to_string(),
            }
        })?;

        Ok(normalize(&parsed))
    }
}

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    provider: Option<Arc<dyn LlmProvider>>,
    verifier: Option<Arc<dyn HumanVerifier>>,
}

impl GatewayBuilder {
    /// Create a new builder.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            provider: None,
            verifier: None,
        }
    }

    /// Use this provider instead of one built from the credential.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Check verification tokens with this verifier.
    pub fn verifier(mut self, verifier: Arc<dyn HumanVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Build the gateway.
    ///
    /// Without an explicit provider, an OpenAI-compatible one is created
    /// from the configured credential. A missing or blank credential is not
    /// an error here; it surfaces per request as `ServerMisconfigured`.
    pub fn build(self) -> Gateway {
        let GatewayConfig {
            bind_addr,
            completion,
            upstream_base_url,
            credential,
            verification,
        } = self.config;

        let provider = self.provider.or_else(|| match credential {
            Some(credential) if !credential.is_empty() => {
                tracing::info!(credential = %credential, base_url = %upstream_base_url, "Upstream provider configured");
                let provider = OpenAiProvider::with_credential(credential)
                    .with_base_url(upstream_base_url);
                Some(Arc::new(provider) as Arc<dyn LlmProvider>)
            }
            _ => {
                tracing::warn!("No upstream API key configured; validation calls will fail");
                None
            }
        });

        Gateway {
            state: Arc::new(GatewayState {
                provider,
                verifier: self.verifier,
                policy: verification,
                completion: completion.clamped(),
                bind_addr,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{CompletionResponse, CredentialSource, TokenUsage};
    use crate::verification::VerificationError;
    use async_trait::async_trait;
    use coursecheck_core::{ValidationStatus, FALLBACK_SUGGESTION};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Reply {
        Content(String),
        Status(u16, String),
        Transport(String),
    }

    // Mock provider returning a canned reply and recording calls
    struct MockProvider {
        reply: Reply,
        healthy: bool,
        calls: AtomicUsize,
        last_messages: Mutex<Vec<ChatMessage>>,
    }

    impl MockProvider {
        fn with_reply(reply: Reply) -> Self {
            Self {
                reply,
                healthy: true,
                calls: AtomicUsize::new(0),
                last_messages: Mutex::new(Vec::new()),
            }
        }

        fn replying(content: &str) -> Arc<Self> {
            Arc::new(Self::with_reply(Reply::Content(content.to_string())))
        }

        fn failing(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self::with_reply(Reply::Status(status, body.to_string())))
        }

        fn unreachable(message: &str) -> Arc<Self> {
            Arc::new(Self::with_reply(Reply::Transport(message.to_string())))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_messages.lock().unwrap() = messages;
            match &self.reply {
                Reply::Content(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    usage: TokenUsage::default(),
                    model: "mock".to_string(),
                }),
                Reply::Status(status, body) => Err(ProviderError::ApiError {
                    status: *status,
                    message: body.clone(),
                }),
                Reply::Transport(message) => Err(ProviderError::HttpError(message.clone())),
            }
        }

        async fn health_check(&self) -> bool {
            self.healthy
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct RejectingVerifier;

    #[async_trait]
    impl HumanVerifier for RejectingVerifier {
        async fn verify(&self, _token: &str) -> Result<bool, VerificationError> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "rejecting"
        }
    }

    fn gateway_with(provider: Arc<MockProvider>) -> Gateway {
        Gateway::builder(GatewayConfig::default())
            .provider(provider)
            .build()
    }

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    const CONFORME: &str = "```json\n{\"status\":\"Conforme\",\"points_positifs\":[\"clair\"],\"points_a_ameliorer\":[],\"suggestion\":\"OK\"}\n```";

    #[tokio::test]
    async fn test_successful_validation() {
        let provider = MockProvider::replying(CONFORME);
        let gateway = gateway_with(provider.clone());

        let result = gateway
            .handle(
                &Method::POST,
                &body(json!({"question": "Q", "answer": "A", "rule": "R"})),
            )
            .await
            .unwrap();

        assert_eq!(result.status, ValidationStatus::Conforme);
        assert_eq!(result.points_positifs, vec!["clair"]);
        assert_eq!(result.suggestion, "OK");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_receives_system_instruction_and_prompt() {
        let provider = MockProvider::replying("{}");
        let gateway = gateway_with(provider.clone());

        gateway
            .handle(&Method::POST, &body(json!({"answer": "Ma réponse", "rule": "Ma règle"})))
            .await
            .unwrap();

        let messages = provider.last_messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system(SYSTEM_INSTRUCTION));
        assert!(messages[1].content.contains("Ma réponse"));
        assert!(messages[1].content.contains("Ma règle"));
    }

    #[tokio::test]
    async fn test_non_post_rejected_without_reading_body() {
        let provider = MockProvider::replying(CONFORME);
        let gateway = gateway_with(provider.clone());

        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
            let result = gateway.handle(&method, b"not even json").await;
            assert!(matches!(result, Err(GatewayError::MethodNotAllowed(_))));
        }
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_never_call_upstream() {
        let provider = MockProvider::replying(CONFORME);
        let gateway = gateway_with(provider.clone());

        let bodies = [
            body(json!({"rule": "R"})),
            body(json!({"answer": "A"})),
            body(json!({})),
            body(json!({"answer": "  ", "rule": "R"})),
            b"not json".to_vec(),
            Vec::new(),
        ];

        for b in bodies {
            let result = gateway.handle(&Method::POST, &b).await;
            assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
        }
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_is_misconfiguration() {
        let gateway = Gateway::builder(GatewayConfig::default()).build();
        assert!(!gateway.upstream_configured());

        let result = gateway
            .handle(&Method::POST, &body(json!({"answer": "A", "rule": "R"})))
            .await;
        assert!(matches!(result, Err(GatewayError::ServerMisconfigured(_))));
    }

    #[tokio::test]
    async fn test_blank_credential_is_misconfiguration() {
        let config = GatewayConfig {
            credential: Some(ApiCredential::new("", CredentialSource::Programmatic, "key")),
            ..GatewayConfig::default()
        };
        assert!(!Gateway::builder(config).build().upstream_configured());
    }

    #[tokio::test]
    async fn test_credential_builds_provider() {
        let config = GatewayConfig {
            credential: Some(ApiCredential::new("sk-x", CredentialSource::Programmatic, "key")),
            ..GatewayConfig::default()
        };
        assert!(Gateway::builder(config).build().upstream_configured());
    }

    #[tokio::test]
    async fn test_upstream_error_surfaces_status_and_body() {
        let provider = MockProvider::failing(429, "rate limited");
        let gateway = gateway_with(provider);

        let result = gateway
            .handle(&Method::POST, &body(json!({"answer": "A", "rule": "R"})))
            .await;

        assert_eq!(
            result,
            Err(GatewayError::UpstreamError {
                status: 429,
                body: "rate limited".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_unhandled() {
        let provider = MockProvider::unreachable("connection refused");
        let gateway = gateway_with(provider.clone());

        let result = gateway
            .handle(&Method::POST, &body(json!({"answer": "A", "rule": "R"})))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, GatewayError::Unhandled(ref m) if m.contains("connection refused")));
        assert_eq!(err.body().details.as_deref().map(|d| d.contains("connection refused")), Some(true));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_health_follows_provider() {
        assert!(!Gateway::builder(GatewayConfig::default()).build().upstream_healthy().await);
        assert!(gateway_with(MockProvider::replying("{}")).upstream_healthy().await);

        let sick = Arc::new(MockProvider {
            healthy: false,
            ..MockProvider::with_reply(Reply::Content("{}".to_string()))
        });
        let gateway = gateway_with(sick);
        assert!(gateway.upstream_configured());
        assert!(!gateway.upstream_healthy().await);
    }

    #[tokio::test]
    async fn test_unparseable_output_is_not_defaulted() {
        let provider = MockProvider::replying("Je ne peux pas aider.");
        let gateway = gateway_with(provider);

        let result = gateway
            .handle(&Method::POST, &body(json!({"answer": "A", "rule": "R"})))
            .await;

        assert_eq!(
            result,
            Err(GatewayError::InvalidUpstreamFormat {
                raw: "Je ne peux pas aider.".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_empty_upstream_content_is_invalid_format() {
        let provider = MockProvider::replying("");
        let gateway = gateway_with(provider);

        let result = gateway
            .handle(&Method::POST, &body(json!({"answer": "A", "rule": "R"})))
            .await;
        assert!(matches!(result, Err(GatewayError::InvalidUpstreamFormat { .. })));
    }

    #[tokio::test]
    async fn test_legacy_keys_are_normalized() {
        let provider = MockProvider::replying("{\"positives\":[\"bien\"],\"negatives\":[\"virgule\"]}");
        let gateway = gateway_with(provider);

        let result = gateway
            .handle(&Method::POST, &body(json!({"answer": "A", "rule": "R"})))
            .await
            .unwrap();

        assert_eq!(result.status, ValidationStatus::AAmeliorer);
        assert_eq!(result.points_positifs, vec!["bien"]);
        assert_eq!(result.points_a_ameliorer, vec!["virgule"]);
        assert_eq!(result.suggestion, FALLBACK_SUGGESTION);
    }

    #[tokio::test]
    async fn test_soft_verification_proceeds() {
        let provider = MockProvider::replying(CONFORME);
        let gateway = Gateway::builder(GatewayConfig::default())
            .provider(provider.clone())
            .verifier(Arc::new(RejectingVerifier))
            .build();

        let result = gateway
            .handle(
                &Method::POST,
                &body(json!({"answer": "A", "rule": "R", "verificationToken": "bad"})),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_enforced_verification_blocks_before_upstream() {
        let provider = MockProvider::replying(CONFORME);
        let config = GatewayConfig {
            verification: VerificationPolicy::enforced(),
            ..GatewayConfig::default()
        };
        let gateway = Gateway::builder(config)
            .provider(provider.clone())
            .verifier(Arc::new(RejectingVerifier))
            .build();

        let result = gateway
            .handle(
                &Method::POST,
                &body(json!({"answer": "A", "rule": "R", "verificationToken": "bad"})),
            )
            .await;

        assert_eq!(result, Err(GatewayError::VerificationFailed));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_completion_temperature_clamped_at_build() {
        let config = GatewayConfig {
            completion: CompletionConfig {
                temperature: 0.9,
                ..CompletionConfig::default()
            },
            ..GatewayConfig::default()
        };
        let gateway = Gateway::builder(config).build();
        assert!(gateway.completion_config().temperature <= 0.3);
    }
}
