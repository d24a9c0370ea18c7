//! Coercion of raw model output into a [`ValidationResult`].
//!
//! Model output is untrusted. It is parsed into a dynamic JSON tree and each
//! field is checked on its own; nothing is deserialized into a strict schema.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{ValidationResult, ValidationStatus, FALLBACK_SUGGESTION};

lazy_static! {
    /// Markdown fence markers, with or without a `json` language tag.
    static ref CODE_FENCE: Regex = Regex::new(r"(?i)```(?:json)?").unwrap();
}

/// Legacy key accepted in place of `points_positifs`.
pub const LEGACY_POSITIVES_KEY: &str = "positives";

/// Legacy key accepted in place of `points_a_ameliorer`.
pub const LEGACY_NEGATIVES_KEY: &str = "negatives";

/// Errors from parsing model output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// The text left after fence stripping is not JSON.
    #[error("model output is not valid JSON: {reason}")]
    InvalidJson {
        /// Fence-stripped text, kept for diagnosis
        raw: String,
        reason: String,
    },
}

impl NormalizeError {
    /// The unparsed text that caused the error.
    pub fn raw(&self) -> &str {
        match self {
            NormalizeError::InvalidJson { raw, .. } => raw,
        }
    }
}

/// Remove every code-fence marker and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw, "").trim().to_string()
}

/// Strip fences and parse the remainder as JSON.
pub fn parse_model_output(raw: &str) -> Result<JsonValue, NormalizeError> {
    let stripped = strip_code_fences(raw);
    serde_json::from_str(&stripped).map_err(|e| NormalizeError::InvalidJson {
        reason: e.to_string(),
        raw: stripped,
    })
}

/// Turn a parsed, untrusted object into a well-formed result.
///
/// Each field falls back to its default independently. Non-object input
/// yields the default result.
pub fn normalize(parsed: &JsonValue) -> ValidationResult {
    ValidationResult {
        status: status_field(parsed),
        points_positifs: list_field(parsed, "points_positifs", LEGACY_POSITIVES_KEY),
        points_a_ameliorer: list_field(parsed, "points_a_ameliorer", LEGACY_NEGATIVES_KEY),
        suggestion: suggestion_field(parsed),
    }
}

/// Parse and normalize in one step.
pub fn normalize_model_output(raw: &str) -> Result<ValidationResult, NormalizeError> {
    parse_model_output(raw).map(|parsed| normalize(&parsed))
}

fn status_field(parsed: &JsonValue) -> ValidationStatus {
    match parsed.get("status") {
        Some(JsonValue::String(label)) if !label.trim().is_empty() => {
            ValidationStatus::from_model_label(label).unwrap_or_else(|| {
                tracing::debug!(status = %label, "Unknown status from model, using default");
                ValidationStatus::default()
            })
        }
        _ => ValidationStatus::default(),
    }
}

fn list_field(parsed: &JsonValue, key: &str, legacy_key: &str) -> Vec<String> {
    let items = parsed
        .get(key)
        .and_then(JsonValue::as_array)
        .or_else(|| parsed.get(legacy_key).and_then(JsonValue::as_array));

    match items {
        Some(items) => items.iter().filter_map(list_item).collect(),
        None => Vec::new(),
    }
}

/// Strings pass through; other scalars are stringified; the rest is dropped.
fn list_item(item: &JsonValue) -> Option<String> {
    match item {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn suggestion_field(parsed: &JsonValue) -> String {
    parsed
        .get("suggestion")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_SUGGESTION.to_string())
}
