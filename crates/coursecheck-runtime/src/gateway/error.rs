//! Gateway error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coursecheck_core::RequestError;
use serde::Serialize;
use thiserror::Error;

/// Every way a validation call can fail.
///
/// Each variant maps to one HTTP status and a JSON body
/// `{"error", "details"?, "raw"?}`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Missing or blank `answer` / `rule`, or a body that is not an object
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Verification failed under an enforced policy
    #[error("verification failed")]
    VerificationFailed,

    /// No upstream credential configured
    #[error("server misconfigured: {0}")]
    ServerMisconfigured(String),

    /// Upstream answered with a non-2xx status
    #[error("upstream error {status}")]
    UpstreamError { status: u16, body: String },

    /// Upstream text did not parse as JSON after fence stripping
    #[error("upstream returned invalid JSON")]
    InvalidUpstreamFormat { raw: String },

    #[error("unhandled error: {0}")]
    Unhandled(String),
}

/// JSON body returned on failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::VerificationFailed => StatusCode::FORBIDDEN,
            GatewayError::ServerMisconfigured(_)
            | GatewayError::UpstreamError { .. }
            | GatewayError::InvalidUpstreamFormat { .. }
            | GatewayError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing body. Messages are in French, like the rest of the API.
    pub fn body(&self) -> ErrorBody {
        let plain = |error: &str| ErrorBody {
            error: error.to_string(),
            details: None,
            raw: None,
        };

        match self {
            GatewayError::InvalidRequest(_) => {
                plain("Les champs 'answer' et 'rule' sont obligatoires.")
            }
            GatewayError::MethodNotAllowed(_) => plain("Méthode non autorisée"),
            GatewayError::VerificationFailed => plain("Vérification anti-robot invalide."),
            GatewayError::ServerMisconfigured(_) => {
                plain("Clé API du service de génération non configurée sur le serveur")
            }
            GatewayError::UpstreamError { status, body } => ErrorBody {
                error: format!("Erreur du service de génération ({})", status),
                details: Some(body.clone()),
                raw: None,
            },
            GatewayError::InvalidUpstreamFormat { raw } => ErrorBody {
                error: "Réponse IA non valide (JSON invalide)".to_string(),
                details: None,
                raw: Some(raw.clone()),
            },
            GatewayError::Unhandled(message) => ErrorBody {
                error: "Erreur serveur lors de l'appel au service de génération".to_string(),
                details: Some(message.clone()),
                raw: None,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}
