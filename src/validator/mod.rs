//! # Workflow Validation Capability
//!
//! The refinement loop never judges a workflow itself: it asks a
//! [`WorkflowValidator`] and treats the answer as data.
//!
//! - [`GatewayValidator`] - authoritative remote validator (HTTP gateway)
//! - [`LocalValidator`] - offline structural pre-check
//! - [`MockValidator`] - scripted responses for tests
//!
//! Reported problems are never errors: `validate` returns `Err` only when the
//! validator itself could not be reached or answered garbage.
//!
//! ```rust
//! use taskweave::validator::{ValidationIssue, ValidationResult};
//!
//! let result = ValidationResult::with_errors(vec![
//!     ValidationIssue::new("Task 'sendmail' not found"),
//!     ValidationIssue::with_code("Circular dependency detected: a → b → a", "CIRCULAR_DEPENDENCY"),
//! ]);
//! assert!(!result.valid);
//! assert_eq!(result.error_messages().len(), 2);
//! ```

mod gateway;
mod local;
mod mock;

pub use gateway::GatewayValidator;
pub use local::LocalValidator;
pub use mock::MockValidator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Async validation capability consumed by the refinement engine
#[async_trait]
pub trait WorkflowValidator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Validate workflow text
    async fn validate(&self, yaml: &str) -> Result<ValidationResult>;
}

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A single reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IssueRepr")]
pub struct ValidationIssue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Gateways report issues either as bare strings or as objects
#[derive(Deserialize)]
#[serde(untagged)]
enum IssueRepr {
    Text(String),
    Detailed {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
}

impl From<IssueRepr> for ValidationIssue {
    fn from(repr: IssueRepr) -> Self {
        match repr {
            IssueRepr::Text(message) => Self {
                message,
                code: None,
            },
            IssueRepr::Detailed { message, code } => Self { message, code },
        }
    }
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// Outcome of one validation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawValidationResult")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// `valid` may be omitted by the gateway; it then follows from `errors`
#[derive(Deserialize)]
struct RawValidationResult {
    #[serde(default, alias = "isValid")]
    valid: Option<bool>,
    #[serde(default)]
    errors: Vec<ValidationIssue>,
    #[serde(default)]
    warnings: Vec<ValidationIssue>,
}

impl From<RawValidationResult> for ValidationResult {
    fn from(raw: RawValidationResult) -> Self {
        Self {
            valid: raw.valid.unwrap_or(raw.errors.is_empty()),
            errors: raw.errors,
            warnings: raw.warnings,
        }
    }
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_errors(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// Order-independent identity of the error set
    pub fn signature(&self) -> String {
        error_signature(&self.errors)
    }
}

/// Sorted, newline-joined error messages
pub fn error_signature(errors: &[ValidationIssue]) -> String {
    let mut messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    messages.sort_unstable();
    messages.join("\n")
}
