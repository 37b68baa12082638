//! Step wiring
//!
//! Turns a [`TaskChain`] into named, dependency-ordered workflow steps whose
//! inputs reference the previous step's outputs.
//!
//! Expression forms:
//! - `$.input.{field}` - workflow input
//! - `$.steps.{step}.outputs.{field}` - a prior step's output

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::chain::TaskChain;

/// One task invocation inside a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub name: String,
    pub task_ref: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Required field name -> data-flow expression (or literal)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub input: IndexMap<String, String>,
}

impl TaskRef {
    pub fn new(name: impl Into<String>, task_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_ref: task_ref.into(),
            depends_on: Vec::new(),
            input: IndexMap::new(),
        }
    }
}

/// `step-{ordinal}-{task}`
pub fn step_name(ordinal: usize, task_name: &str) -> String {
    format!("step-{}-{}", ordinal, task_name)
}

/// `$.steps.{step}.outputs.{field}`
pub fn step_output_expr(step: &str, field: &str) -> String {
    format!("$.steps.{}.outputs.{}", step, field)
}

/// `$.input.{field}`
pub fn workflow_input_expr(field: &str) -> String {
    format!("$.input.{}", field)
}

/// Generate one step per chain task.
///
/// Step 1 has no dependencies and no explicit input: its fields bind to the
/// workflow's top-level input by name. Step `i > 1` depends only on step
/// `i - 1` and maps each linked field onto that step's outputs.
pub fn generate_task_refs(chain: &TaskChain) -> Vec<TaskRef> {
    let mut steps: Vec<TaskRef> = Vec::with_capacity(chain.tasks.len());

    for (index, task) in chain.tasks.iter().enumerate() {
        let mut step = TaskRef::new(step_name(index + 1, &task.name), task.name.as_str());

        if let Some(previous) = steps.last() {
            step.depends_on.push(previous.name.clone());
            if let Some(mappings) = chain.links.get(index - 1) {
                for mapping in mappings {
                    step.input.insert(
                        mapping.to.clone(),
                        step_output_expr(&previous.name, &mapping.from),
                    );
                }
            }
        }

        steps.push(step);
    }

    steps
}
