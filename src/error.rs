//! Error types with fix suggestions

use std::path::PathBuf;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T> = std::result::Result<T, WeaveError>;

/// Errors raised by the synthesis and refinement layers.
///
/// Validator-reported workflow problems are never represented here: they are
/// data on [`crate::validator::ValidationResult`]. Only truly exceptional
/// conditions (bad input files, transport failures) become a `WeaveError`.
#[derive(Error, Debug)]
pub enum WeaveError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Registry errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to load task registry from {}: {details}", .path.display())]
    Registry { path: PathBuf, details: String },

    #[error("Task '{name}' is not in the registry")]
    UnknownTask { name: String },

    // ─────────────────────────────────────────────────────────────
    // Chain construction errors
    // ─────────────────────────────────────────────────────────────
    #[error("Cannot build a chain from an empty task list")]
    EmptyChain,

    #[error("Task '{name}' appears more than once in the chain")]
    DuplicateTask { name: String },

    #[error("Task '{producer}' cannot feed '{consumer}': missing [{}]", .missing.join(", "))]
    IncompatibleLink {
        producer: String,
        consumer: String,
        missing: Vec<String>,
    },

    // ─────────────────────────────────────────────────────────────
    // Gateway errors
    // ─────────────────────────────────────────────────────────────
    #[error("Gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),

    #[error("Gateway returned HTTP {status}: {body}")]
    GatewayStatus { status: u16, body: String },

    #[error("Invalid gateway URL '{url}': {reason}")]
    InvalidGatewayUrl { url: String, reason: String },

    #[error("No gateway URL configured")]
    GatewayNotConfigured,

    #[error("Config error: {reason}")]
    Config { reason: String },
}

impl FixSuggestion for WeaveError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            WeaveError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            WeaveError::Json(_) => Some("Check the JSON document is well-formed"),
            WeaveError::Io(_) => Some("Check file path and permissions"),
            WeaveError::Registry { .. } => {
                Some("Registry files must hold a list of tasks or WorkflowTask documents")
            }
            WeaveError::UnknownTask { .. } => Some("List the registry tasks and check the spelling"),
            WeaveError::EmptyChain => Some("Pass at least one task name"),
            WeaveError::DuplicateTask { .. } => Some("Each task may appear only once in a chain"),
            WeaveError::IncompatibleLink { .. } => {
                Some("Reorder the tasks or insert a task that produces the missing fields")
            }
            WeaveError::Gateway(_) => Some("Check the gateway is reachable (WORKFLOW_GATEWAY_URL)"),
            WeaveError::GatewayStatus { .. } => Some("Check gateway logs and authentication token"),
            WeaveError::InvalidGatewayUrl { .. } => {
                Some("Use an absolute http(s) URL, e.g. http://localhost:5000")
            }
            WeaveError::GatewayNotConfigured => {
                Some("Set WORKFLOW_GATEWAY_URL, pass --gateway, or use --local")
            }
            WeaveError::Config { .. } => Some("Check ~/.config/taskweave/config.toml syntax"),
        }
    }
}
