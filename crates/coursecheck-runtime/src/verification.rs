//! Bot verification and the policy applied to its verdict.
//!
//! The verification service itself is an external collaborator. What lives
//! here is the decision of what to do with its answer: by default a failed
//! check is logged and the request proceeds ("soft" verification). Setting
//! `enforce_verification` turns failures into rejections.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::providers::ApiCredential;

/// Default site-verify endpoint (reCAPTCHA).
pub const DEFAULT_SITE_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Environment variable holding the site-verify secret.
pub const RECAPTCHA_SECRET_ENV: &str = "RECAPTCHA_SECRET";

/// Errors from the verification service.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("verification request failed: {0}")]
    HttpError(String),

    #[error("verification service returned {status}")]
    ApiError { status: u16 },

    #[error("unreadable verification response: {0}")]
    ParseError(String),
}

/// A service that checks a client-side challenge token.
#[async_trait]
pub trait HumanVerifier: Send + Sync {
    /// `Ok(true)` when the token proves a human, `Ok(false)` when rejected.
    async fn verify(&self, token: &str) -> Result<bool, VerificationError>;

    /// Verifier name for logs.
    fn name(&self) -> &str;
}

/// What happened when a request's token was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// No verifier configured; nothing was checked
    Skipped,
    Passed,
    /// The request carried no token
    Missing,
    Rejected,
    /// The verifier could not be reached or answered garbage
    Errored(String),
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Skipped | VerificationOutcome::Passed)
    }
}

/// Policy applied to a verification outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// Reject requests whose verification did not pass
    pub enforce_verification: bool,
}

impl VerificationPolicy {
    pub fn soft() -> Self {
        Self {
            enforce_verification: false,
        }
    }

    pub fn enforced() -> Self {
        Self {
            enforce_verification: true,
        }
    }

    /// Whether a request with this outcome may proceed.
    ///
    /// Failures are always logged, whether or not they block.
    pub fn admits(&self, outcome: &VerificationOutcome) -> bool {
        if outcome.is_success() {
            return true;
        }

        if self.enforce_verification {
            tracing::warn!(outcome = ?outcome, "Verification failed, rejecting request");
            false
        } else {
            tracing::warn!(outcome = ?outcome, "Verification failed, proceeding (soft policy)");
            true
        }
    }
}

/// Run the verifier (if any) against an optional token.
pub async fn check_token(
    verifier: Option<&dyn HumanVerifier>,
    token: Option<&str>,
) -> VerificationOutcome {
    let Some(verifier) = verifier else {
        return VerificationOutcome::Skipped;
    };

    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return VerificationOutcome::Missing;
    };

    match verifier.verify(token).await {
        Ok(true) => VerificationOutcome::Passed,
        Ok(false) => VerificationOutcome::Rejected,
        Err(e) => {
            tracing::error!(verifier = verifier.name(), error = %e, "Verification service error");
            VerificationOutcome::Errored(e.to_string())
        }
    }
}

/// reCAPTCHA-style verifier: form POST of `secret` + `response`.
pub struct SiteVerifyVerifier {
    secret: ApiCredential,
    url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for SiteVerifyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteVerifyVerifier")
            .field("secret", &self.secret)
            .field("url", &self.url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl SiteVerifyVerifier {
    pub fn new(secret: ApiCredential) -> Self {
        Self {
            secret,
            url: DEFAULT_SITE_VERIFY_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set custom verify URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl HumanVerifier for SiteVerifyVerifier {
    async fn verify(&self, token: &str) -> Result<bool, VerificationError> {
        // SECURITY: Only expose the secret here, at the point of use
        let response = self
            .client
            .post(&self.url)
            .form(&[("secret", self.secret.expose()), ("response", token)])
            .send()
            .await
            .map_err(|e| VerificationError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerificationError::ApiError {
                status: status.as_u16(),
            });
        }

        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| VerificationError::ParseError(e.to_string()))?;

        if !body.success {
            tracing::debug!(error_codes = ?body.error_codes, "Token rejected by verifier");
        }
        Ok(body.success)
    }

    fn name(&self) -> &str {
        "site-verify"
    }
}
