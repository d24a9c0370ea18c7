//! # coursecheck-runtime
//!
//! Networked half of the course-plan answer validation pipeline.
//!
//! - [`gateway`]: the HTTP endpoint that builds the prompt, calls the model
//!   once and returns a normalized verdict
//! - [`providers`]: the chat-completion backend and credential handling
//! - [`verification`]: bot verification and the soft/enforced policy
//! - [`client`]: the adapter forms use to call the gateway

pub mod client;
pub mod gateway;
pub mod providers;
pub mod verification;

pub use client::{ValidationClient, DEFAULT_GATEWAY_URL, GATEWAY_URL_ENV};
pub use gateway::{
    ErrorBody, Gateway, GatewayBuilder, GatewayConfig, GatewayError, HEALTH_PATH, VALIDATE_PATH,
};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CredentialSource, LlmProvider, OpenAiProvider,
    ProviderError, DEFAULT_OPENAI_BASE_URL, MAX_TEMPERATURE, OPENAI_API_KEY_ENV,
};
pub use verification::{
    HumanVerifier, SiteVerifyVerifier, VerificationPolicy, DEFAULT_SITE_VERIFY_URL,
    RECAPTCHA_SECRET_ENV,
};
