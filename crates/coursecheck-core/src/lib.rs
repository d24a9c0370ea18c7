//! # coursecheck-core
//!
//! Deterministic half of the course-plan answer validation pipeline.
//!
//! This crate answers two questions without touching the network:
//! - What do we ask the model? ([`prompt`])
//! - What do we make of what it said? ([`normalize`])
//!
//! ## Key Guarantees
//!
//! 1. **Pure**: prompt building and normalization have no side effects
//! 2. **Total**: any parsed JSON value normalizes to a well-formed result
//! 3. **Lenient input, strict output**: legacy keys and odd types are
//!    accepted, the returned [`ValidationResult`] always has the same shape
//!
//! ## Example
//!
//! ```rust
//! use coursecheck_core::{build_prompt, normalize_model_output, ValidationStatus};
//!
//! let prompt = build_prompt(Some("Objectifs ?"), "Comprendre X", "Verbe d'action");
//! assert!(prompt.contains("Comprendre X"));
//!
//! let result = normalize_model_output("```json\n{\"status\":\"Conforme\"}\n```").unwrap();
//! assert_eq!(result.status, ValidationStatus::Conforme);
//! ```

pub mod normalize;
pub mod plan;
pub mod prompt;
mod render;
pub mod types;

// Re-export main types at crate root
pub use normalize::{
    normalize, normalize_model_output, parse_model_output, strip_code_fences, NormalizeError,
};
pub use plan::{Plan, PlanAnswer, PlanError};
pub use prompt::{build_prompt, GRAMMAR_CORRECTION_QUESTION, GRAMMAR_CORRECTION_RULE, SYSTEM_INSTRUCTION};
pub use types::{
    RequestError, ValidationRequest, ValidationResult, ValidationStatus, FALLBACK_SUGGESTION,
    MISSING_ANSWER_SUGGESTION, TECHNICAL_ERROR_SUGGESTION,
};
