//! API keys and verifier secrets.
//!
//! The CLI loads each secret once at startup (flag first, then the
//! environment) and hands an [`ApiCredential`] to the component that sends
//! it. The plain value is only read when a request header or form is built.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Origin of a credential, shown in startup logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `--api-key` / `--recaptcha-secret`
    CommandLine,
    Environment,
    /// Built in code (tests, embedding)
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::CommandLine => write!(f, "command line"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A secret value with a label. `Debug` and `Display` never print the value.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Read `env_var`; unset or blank is `NotConfigured`.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("{name} missing: ${env_var} is unset or blank"))
            })
    }

    /// The plain value, for the `Authorization` header or verify form.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Blank (whitespace only) counts as empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiCredential")
            .field(&self.name)
            .field(&self.source)
            .field(&format_args!("[REDACTED]"))
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}
