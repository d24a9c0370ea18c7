//! Course plans loaded from YAML/JSON.
//!
//! A plan is the list of question/rule/answer triples an instructor fills in
//! from a form template. Only the fields the validation pipeline reads are
//! modelled here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::ValidationRequest;

/// Errors that can occur when loading plans.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Failed to read plan file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Plan validation failed: {0}")]
    ValidationError(String),
}

/// One answered question of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanAnswer {
    /// The form question
    #[serde(default)]
    pub question: Option<String>,

    /// Rule attached to the question by the form template
    pub rule: String,

    /// The instructor's answer (may still be blank)
    #[serde(default)]
    pub answer: String,
}

impl PlanAnswer {
    /// Whether the instructor has written something for this question.
    pub fn is_answered(&self) -> bool {
        !self.answer.trim().is_empty()
    }

    /// Convert to a validation request; `None` when the answer is blank.
    pub fn to_request(&self) -> Option<ValidationRequest> {
        ValidationRequest::new(self.question.clone(), self.answer.clone(), self.rule.clone()).ok()
    }
}

/// An instructor's course plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Title of the form the plan was filled from
    #[serde(default)]
    pub title: Option<String>,

    /// Answers in form order
    pub answers: Vec<PlanAnswer>,
}

impl Plan {
    /// Parse a plan from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PlanError> {
        let plan: Plan = serde_yaml::from_str(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Parse a plan from JSON string.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let plan: Plan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load a plan file, choosing the format from the extension.
    ///
    /// `.json` files are read as JSON; anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Validate the plan structure.
    fn validate(&self) -> Result<(), PlanError> {
        if self.answers.is_empty() {
            return Err(PlanError::ValidationError(
                "plan has no answers".to_string(),
            ));
        }

        for (index, answer) in self.answers.iter().enumerate() {
            if answer.rule.trim().is_empty() {
                return Err(PlanError::ValidationError(format!(
                    "answer {} has an empty rule",
                    index + 1
                )));
            }
        }

        Ok(())
    }

    /// Number of answers that still need to be written.
    pub fn unanswered(&self) -> usize {
        self.answers.iter().filter(|a| !a.is_answered()).count()
    }
}
