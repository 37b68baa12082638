//! Error classification
//!
//! Sorts validator-reported errors into kinds by error code first, then by
//! message pattern. Only two kinds have an automated repair; everything else
//! (cycles, type mismatches, parse errors, anything unrecognized) is left
//! for a human or the generator to fix.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::validator::ValidationIssue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// `taskRef` names a task the registry does not know.
    /// `name` is `None` when the message does not say which one.
    UnknownTaskRef { name: Option<String> },
    /// Data-flow expression with broken delimiters
    MalformedExpression,
    CircularDependency,
    TypeMismatch,
    SyntaxError,
    Unrecognized,
}

impl ErrorKind {
    pub fn is_fixable(&self) -> bool {
        match self {
            ErrorKind::UnknownTaskRef { name } => name.is_some(),
            ErrorKind::MalformedExpression => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::UnknownTaskRef { .. } => "unknown-task-ref",
            ErrorKind::MalformedExpression => "malformed-expression",
            ErrorKind::CircularDependency => "circular-dependency",
            ErrorKind::TypeMismatch => "type-mismatch",
            ErrorKind::SyntaxError => "syntax-error",
            ErrorKind::Unrecognized => "unrecognized",
        }
    }
}

static CYCLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:circular|cycles?|cyclic)\b").unwrap());

static EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:invalid|malformed|unterminated|unclosed|unbalanced|bad)\s+(?:template|expression|data[- ]flow)|(?:template|expression)\s+(?:syntax|parse)\s+error|(?:template|expression)\b.*\b(?:unterminated|unclosed|unbalanced|malformed|delimiter)",
    )
    .unwrap()
});

/// `Task 'x' not found`, `taskRef "x" does not exist`, `WorkflowTask 'x' not found`
static TASK_NAMED_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)task\s*(?:ref(?:erence)?)?\s*['"`]([^'"`]+)['"`]\s*(?:was\s+)?(?:not found|does not exist|is not registered|not registered|could not be resolved|is unknown|unresolved)"#,
    )
    .unwrap()
});

/// `Unknown task: x`, `unresolved taskRef 'x'`. The name must follow a colon
/// or be quoted; `missing taskRef field` names nothing.
static TASK_NAMED_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:unknown|unresolved|missing|undefined)\s+task\s*(?:ref(?:erence)?)?\s*(?::\s*['"`]?([A-Za-z0-9_.:/-]+)|['"`]([^'"`]+)['"`])"#,
    )
    .unwrap()
});

/// Task-reference problem without a recoverable name
static TASK_ANONYMOUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)task\s*ref.*(?:not found|unknown|unresolved)").unwrap());

static TYPE_MISMATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)type mismatch|(?:expected|incompatible)\s+type|schema\s+(?:mismatch|validation)|does not match (?:the )?schema",
    )
    .unwrap()
});

static SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\byaml\b|parse error|syntax error|could not parse|failed to parse|invalid document|did not find expected",
    )
    .unwrap()
});

/// Classify one validator error
pub fn classify(issue: &ValidationIssue) -> ErrorKind {
    if let Some(kind) = issue.code.as_deref().and_then(|code| classify_code(code, &issue.message)) {
        return kind;
    }
    classify_message(&issue.message)
}

pub fn is_fixable(issue: &ValidationIssue) -> bool {
    classify(issue).is_fixable()
}

fn classify_code(code: &str, message: &str) -> Option<ErrorKind> {
    let normalized = code.trim().to_ascii_uppercase().replace('-', "_");
    let kind = match normalized.as_str() {
        "TASK_NOT_FOUND" | "UNKNOWN_TASK" | "UNKNOWN_TASK_REF" | "UNRESOLVED_TASK_REF"
        | "TASKREF_NOT_FOUND" => ErrorKind::UnknownTaskRef {
            name: extract_task_name(message),
        },
        "INVALID_TEMPLATE" | "INVALID_EXPRESSION" | "MALFORMED_EXPRESSION" | "TEMPLATE_SYNTAX"
        | "TEMPLATE_PARSE_ERROR" => ErrorKind::MalformedExpression,
        "CIRCULAR_DEPENDENCY" | "CYCLE_DETECTED" | "DEPENDENCY_CYCLE" => {
            ErrorKind::CircularDependency
        }
        "TYPE_MISMATCH" | "SCHEMA_MISMATCH" | "SCHEMA_VALIDATION" | "INVALID_TYPE" => {
            ErrorKind::TypeMismatch
        }
        "YAML_PARSE_ERROR" | "PARSE_ERROR" | "SYNTAX_ERROR" | "INVALID_YAML" => {
            ErrorKind::SyntaxError
        }
        _ => return None,
    };
    Some(kind)
}

fn classify_message(message: &str) -> ErrorKind {
    if CYCLE.is_match(message) {
        return ErrorKind::CircularDependency;
    }
    if EXPRESSION.is_match(message) {
        return ErrorKind::MalformedExpression;
    }
    if let Some(name) = extract_task_name(message) {
        return ErrorKind::UnknownTaskRef { name: Some(name) };
    }
    if TASK_ANONYMOUS.is_match(message) {
        return ErrorKind::UnknownTaskRef { name: None };
    }
    if TYPE_MISMATCH.is_match(message) {
        return ErrorKind::TypeMismatch;
    }
    if SYNTAX.is_match(message) {
        return ErrorKind::SyntaxError;
    }
    ErrorKind::Unrecognized
}

/// Offending task name from an unresolved-reference message
pub fn extract_task_name(message: &str) -> Option<String> {
    TASK_NAMED_FIRST
        .captures(message)
        .or_else(|| TASK_NAMED_AFTER.captures(message))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}
