//! Client adapter: calls the gateway on behalf of a form and never fails.
//!
//! Whatever goes wrong between the caller and the gateway (connection
//! refused, timeout, error status, unreadable body) the caller receives a
//! technical-error [`ValidationResult`] instead of an error.

use std::time::Duration;

use coursecheck_core::{normalize, PlanAnswer, ValidationResult};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Default gateway endpoint for local development.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080/validateAnswerAI";

/// Environment variable overriding the gateway endpoint.
pub const GATEWAY_URL_ENV: &str = "COURSECHECK_GATEWAY_URL";

#[derive(Error, Debug)]
enum ClientError {
    #[error("gateway unreachable: {0}")]
    Transport(String),

    #[error("gateway returned {0}")]
    Status(u16),

    #[error("unreadable gateway response: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct ValidateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    question: Option<&'a str>,
    answer: &'a str,
    rule: &'a str,
}

/// HTTP client for the validation gateway.
#[derive(Debug, Clone)]
pub struct ValidationClient {
    gateway_url: String,
    client: reqwest::Client,
}

impl ValidationClient {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Bound every call by `timeout`. A timed-out call yields the
    /// technical-error result like any other transport failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(client) = reqwest::Client::builder().timeout(timeout).build() {
            self.client = client;
        } else {
            tracing::warn!(?timeout, "Could not build HTTP client with timeout, keeping default");
        }
        self
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    /// Validate one answer. Never fails.
    pub async fn analyze(
        &self,
        question: Option<&str>,
        answer: &str,
        rule: &str,
    ) -> ValidationResult {
        match self.try_analyze(question, answer, rule).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(url = %self.gateway_url, error = %e, "Validation call failed");
                ValidationResult::technical_error()
            }
        }
    }

    /// Validate every answer of a plan, one call at a time, in order.
    ///
    /// Blank answers are not sent; they get the missing-answer result.
    pub async fn analyze_plan(&self, answers: &[PlanAnswer]) -> Vec<ValidationResult> {
        let mut results = Vec::with_capacity(answers.len());

        for (index, entry) in answers.iter().enumerate() {
            let result = match entry.to_request() {
                Some(request) => {
                    tracing::debug!(index, "Validating plan answer");
                    self.analyze(request.question(), &request.answer, &request.rule)
                        .await
                }
                None => {
                    tracing::debug!(index, "Skipping blank plan answer");
                    ValidationResult::missing_answer()
                }
            };
            results.push(result);
        }

        results
    }

    async fn try_analyze(
        &self,
        question: Option<&str>,
        answer: &str,
        rule: &str,
    ) -> Result<ValidationResult, ClientError> {
        let body = ValidateBody {
            question: question.filter(|q| !q.trim().is_empty()),
            answer,
            rule,
        };

        let response = self
            .client
            .post(&self.gateway_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let value: JsonValue = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        // The gateway already normalizes; doing it again keeps the result
        // well-formed even against a foreign or older gateway.
        Ok(normalize(&value))
    }
}

impl Default for ValidationClient {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecheck_core::{ValidationStatus, MISSING_ANSWER_SUGGESTION, TECHNICAL_ERROR_SUGGESTION};

    // Port 1 is never served in the test environment
    const UNREACHABLE: &str = "http://127.0.0.1:1/validateAnswerAI";

    #[tokio::test]
    async fn test_unreachable_gateway_yields_technical_error() {
        let client = ValidationClient::new(UNREACHABLE).with_timeout(Duration::from_secs(2));
        let result = client.analyze(Some("Q"), "A", "R").await;

        assert_eq!(result.status, ValidationStatus::ErreurTechnique);
        assert_eq!(result.suggestion, TECHNICAL_ERROR_SUGGESTION);
        assert!(result.points_positifs.is_empty());
        assert!(result.points_a_ameliorer.is_empty());
    }

    #[tokio::test]
    async fn test_plan_blank_answers_are_not_sent() {
        let client = ValidationClient::new(UNREACHABLE).with_timeout(Duration::from_secs(2));
        let answers = vec![
            PlanAnswer {
                question: Some("Q1".to_string()),
                rule: "R1".to_string(),
                answer: "   ".to_string(),
            },
            PlanAnswer {
                question: None,
                rule: "R2".to_string(),
                answer: "Réponse".to_string(),
            },
        ];

        let results = client.analyze_plan(&answers).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].suggestion, MISSING_ANSWER_SUGGESTION);
        assert_eq!(results[1].status, ValidationStatus::ErreurTechnique);
    }

    #[test]
    fn test_body_omits_blank_question() {
        let body = ValidateBody {
            question: Some("  ").filter(|q| !q.trim().is_empty()),
            answer: "A",
            rule: "R",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("question").is_none());
        assert_eq!(value["answer"], "A");
    }

    #[test]
    fn test_default_points_at_local_gateway() {
        assert_eq!(ValidationClient::default().gateway_url(), DEFAULT_GATEWAY_URL);
    }
}
