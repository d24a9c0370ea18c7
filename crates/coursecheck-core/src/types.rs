//! Data model shared by the gateway and its clients.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

/// Suggestion used whenever the model gives none.
pub const FALLBACK_SUGGESTION: &str =
    "Veuillez préciser davantage certains éléments du plan de cours.";

/// Suggestion shown when the validation service could not be reached.
pub const TECHNICAL_ERROR_SUGGESTION: &str =
    "Impossible de contacter le serveur de validation. Réessayez plus tard.";

/// Suggestion shown when a plan answer is blank and was not sent for review.
pub const MISSING_ANSWER_SUGGESTION: &str = "Veuillez saisir une réponse.";

/// Errors raised when an inbound validation request is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("missing or empty required field: {0}")]
    MissingField(&'static str),
}

/// Verdict attached to a reviewed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ValidationStatus {
    #[serde(rename = "Conforme")]
    Conforme,

    #[serde(rename = "À améliorer")]
    #[default]
    AAmeliorer,

    #[serde(rename = "Non conforme")]
    NonConforme,

    /// Only ever produced locally, when the service could not be reached.
    #[serde(rename = "Erreur Technique")]
    ErreurTechnique,
}

impl ValidationStatus {
    /// Statuses the model is allowed to return.
    pub const MODEL_FACING: [ValidationStatus; 3] = [
        ValidationStatus::Conforme,
        ValidationStatus::AAmeliorer,
        ValidationStatus::NonConforme,
    ];

    /// Wire label for this status.
    pub fn label(&self) -> &'static str {
        match self {
            ValidationStatus::Conforme => "Conforme",
            ValidationStatus::AAmeliorer => "À améliorer",
            ValidationStatus::NonConforme => "Non conforme",
            ValidationStatus::ErreurTechnique => "Erreur Technique",
        }
    }

    /// Match a model-supplied label against the model-facing statuses.
    ///
    /// Comparison ignores surrounding whitespace and case.
    /// `"Erreur Technique"` is not accepted from the model.
    pub fn from_model_label(label: &str) -> Option<Self> {
        let wanted = label.trim().to_lowercase();
        Self::MODEL_FACING
            .into_iter()
            .find(|status| status.label().to_lowercase() == wanted)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An answer submitted for review, with the rule it must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// The form question, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    /// The instructor's answer
    pub answer: String,

    /// The rule the answer is checked against
    pub rule: String,
}

impl ValidationRequest {
    /// Build a request, rejecting blank `answer` or `rule`.
    pub fn new(
        question: Option<String>,
        answer: impl Into<String>,
        rule: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let request = Self {
            question,
            answer: answer.into(),
            rule: rule.into(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Extract a request from an untrusted JSON body.
    ///
    /// Non-string values for `answer` and `rule` count as missing. A
    /// non-string or blank `question` is dropped.
    pub fn from_json(body: &JsonValue) -> Result<Self, RequestError> {
        let object = body.as_object().ok_or(RequestError::NotAnObject)?;

        let text = |key: &str| {
            object
                .get(key)
                .and_then(JsonValue::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };

        let answer = text("answer").ok_or(RequestError::MissingField("answer"))?;
        let rule = text("rule").ok_or(RequestError::MissingField("rule"))?;

        Ok(Self {
            question: text("question"),
            answer,
            rule,
        })
    }

    /// Check the non-empty invariants on `answer` and `rule`.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.answer.trim().is_empty() {
            return Err(RequestError::MissingField("answer"));
        }
        if self.rule.trim().is_empty() {
            return Err(RequestError::MissingField("rule"));
        }
        Ok(())
    }

    /// The question, if present and not blank.
    pub fn question(&self) -> Option<&str> {
        self.question.as_deref().filter(|q| !q.trim().is_empty())
    }
}

/// The fixed-shape result returned for every reviewed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,

    #[serde(default)]
    pub points_positifs: Vec<String>,

    #[serde(default)]
    pub points_a_ameliorer: Vec<String>,

    pub suggestion: String,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            status: ValidationStatus::default(),
            points_positifs: Vec::new(),
            points_a_ameliorer: Vec::new(),
            suggestion: FALLBACK_SUGGESTION.to_string(),
        }
    }
}

impl ValidationResult {
    /// Result handed to callers when the validation service is unreachable.
    pub fn technical_error() -> Self {
        Self {
            status: ValidationStatus::ErreurTechnique,
            points_positifs: Vec::new(),
            points_a_ameliorer: Vec::new(),
            suggestion: TECHNICAL_ERROR_SUGGESTION.to_string(),
        }
    }

    /// Result for a plan answer left blank.
    pub fn missing_answer() -> Self {
        Self {
            suggestion: MISSING_ANSWER_SUGGESTION.to_string(),
            ..Self::default()
        }
    }

    /// Whether the result satisfies the data-model invariants.
    pub fn is_well_formed(&self) -> bool {
        !self.suggestion.trim().is_empty()
    }
}
