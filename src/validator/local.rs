//! Offline structural validator
//!
//! A cheap pre-check run without the gateway. It speaks the same message
//! vocabulary the refinement classifier understands:
//!
//! 1. Document - YAML parses, `spec.steps` is a list
//! 2. Steps - names present and unique, `taskRef` present and registered
//! 3. Dependencies - `dependsOn` names existing steps, no cycles
//! 4. Expressions - `{{ }}` delimiters balanced in every string value

use async_trait::async_trait;
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{ValidationIssue, ValidationResult, WorkflowValidator};
use crate::error::Result;
use crate::schema::TaskDefinition;

pub const CODE_PARSE: &str = "YAML_PARSE_ERROR";
pub const CODE_MISSING_STEPS: &str = "MISSING_STEPS";
pub const CODE_INVALID_STEP: &str = "INVALID_STEP";
pub const CODE_DUPLICATE_STEP: &str = "DUPLICATE_STEP";
pub const CODE_TASK_NOT_FOUND: &str = "TASK_NOT_FOUND";
pub const CODE_UNKNOWN_DEPENDENCY: &str = "UNKNOWN_DEPENDENCY";
pub const CODE_CYCLE: &str = "CIRCULAR_DEPENDENCY";
pub const CODE_TEMPLATE: &str = "INVALID_TEMPLATE";

pub struct LocalValidator {
    task_names: HashSet<String>,
}

impl LocalValidator {
    /// With an empty registry, `taskRef` existence is not checked
    pub fn new(tasks: &[TaskDefinition]) -> Self {
        Self {
            task_names: tasks.iter().map(|t| t.name.clone()).collect(),
        }
    }

    /// Synchronous entry point used by the CLI and the async trait impl
    pub fn check(&self, yaml: &str) -> ValidationResult {
        let document: Value = match serde_yaml::from_str(yaml) {
            Ok(doc) => doc,
            Err(e) => {
                return ValidationResult::with_errors(vec![ValidationIssue::with_code(
                    format!("YAML parse error: {}", e),
                    CODE_PARSE,
                )])
            }
        };

        let Some(steps) = document
            .get("spec")
            .and_then(|spec| spec.get("steps"))
            .and_then(Value::as_sequence)
        else {
            return ValidationResult::with_errors(vec![ValidationIssue::with_code(
                "Workflow has no spec.steps list",
                CODE_MISSING_STEPS,
            )]);
        };

        let mut errors = Vec::new();
        let graph = self.check_steps(steps, &mut errors);
        check_dependencies(&graph, &mut errors);
        check_expressions(&document, &mut errors);

        debug!(steps = steps.len(), errors = errors.len(), "Local validation complete");
        ValidationResult::with_errors(errors)
    }

    /// Layer 2: step names and task references. Returns step -> dependsOn.
    fn check_steps<'a>(
        &self,
        steps: &'a [Value],
        errors: &mut Vec<ValidationIssue>,
    ) -> Vec<(&'a str, Vec<&'a str>)> {
        let mut graph = Vec::with_capacity(steps.len());
        let mut seen = HashSet::new();

        for (index, step) in steps.iter().enumerate() {
            let Some(name) = step.get("name").and_then(Value::as_str) else {
                errors.push(ValidationIssue::with_code(
                    format!("Step #{} has no name", index + 1),
                    CODE_INVALID_STEP,
                ));
                continue;
            };

            if !seen.insert(name) {
                errors.push(ValidationIssue::with_code(
                    format!("Duplicate step name '{}'", name),
                    CODE_DUPLICATE_STEP,
                ));
            }

            match step.get("taskRef").and_then(Value::as_str) {
                None => errors.push(ValidationIssue::with_code(
                    format!("Step '{}' has no taskRef", name),
                    CODE_INVALID_STEP,
                )),
                Some(task) if !self.task_names.is_empty() && !self.task_names.contains(task) => {
                    errors.push(ValidationIssue::with_code(
                        format!("Task '{}' not found (step '{}')", task, name),
                        CODE_TASK_NOT_FOUND,
                    ))
                }
                Some(_) => {}
            }

            let depends_on = step
                .get("dependsOn")
                .and_then(Value::as_sequence)
                .map(|deps| deps.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            graph.push((name, depends_on));
        }

        graph
    }
}

/// Layer 3: dangling dependencies and cycles (first cycle only)
fn check_dependencies(graph: &[(&str, Vec<&str>)], errors: &mut Vec<ValidationIssue>) {
    let known: HashSet<&str> = graph.iter().map(|(name, _)| *name).collect();
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();

    for (name, deps) in graph {
        for dep in deps {
            if known.contains(dep) {
                edges.entry(*name).or_default().push(*dep);
            } else {
                errors.push(ValidationIssue::with_code(
                    format!("Step '{}' depends on unknown step '{}'", name, dep),
                    CODE_UNKNOWN_DEPENDENCY,
                ));
            }
        }
    }

    fn detect_cycle<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<String> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        if let Some(neighbors) = edges.get(node) {
            for neighbor in neighbors {
                if !visited.contains(neighbor) {
                    if let Some(cycle) = detect_cycle(*neighbor, edges, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(neighbor) {
                    let start = path.iter().position(|n| n == neighbor).unwrap_or(0);
                    return Some(format!("{} → {}", path[start..].join(" → "), neighbor));
                }
            }
        }

        rec_stack.remove(node);
        path.pop();
        None
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();
    for (name, _) in graph {
        if visited.contains(name) {
            continue;
        }
        if let Some(cycle) = detect_cycle(*name, &edges, &mut visited, &mut rec_stack, &mut path) {
            errors.push(ValidationIssue::with_code(
                format!("Circular dependency detected: {}", cycle),
                CODE_CYCLE,
            ));
            break;
        }
    }
}

/// Layer 4: every string scalar must have balanced `{{ }}` delimiters
fn check_expressions(document: &Value, errors: &mut Vec<ValidationIssue>) {
    match document {
        Value::String(text) => {
            if !delimiters_balanced(text) {
                errors.push(ValidationIssue::with_code(
                    format!("Malformed template expression: '{}'", text),
                    CODE_TEMPLATE,
                ));
            }
        }
        Value::Sequence(items) => items.iter().for_each(|v| check_expressions(v, errors)),
        Value::Mapping(map) => map.values().for_each(|v| check_expressions(v, errors)),
        Value::Tagged(tagged) => check_expressions(&tagged.value, errors),
        _ => {}
    }
}

/// Every `{{` is closed by `}}` before the next `{{`, with no stray braces
pub(crate) fn delimiters_balanced(text: &str) -> bool {
    if text.contains("{{{") || text.contains("}}}") {
        return false;
    }
    let mut rest = text;
    loop {
        let open = rest.find("{{");
        let close = rest.find("}}");
        match (open, close) {
            (None, None) => return true,
            (None, Some(_)) => return false,
            (Some(o), Some(c)) if c < o => return false,
            (Some(_), None) => return false,
            (Some(o), Some(c)) => {
                let inner = &rest[o + 2..c];
                if inner.contains("{{") || inner.contains('{') || inner.contains('}') {
                    return false;
                }
                rest = &rest[c + 2..];
            }
        }
    }
}

#[async_trait]
impl WorkflowValidator for LocalValidator {
    fn name(&self) -> &str {
        "local"
    }

    async fn validate(&self, yaml: &str) -> Result<ValidationResult> {
        Ok(self.check(yaml))
    }
}
