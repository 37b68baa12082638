//! Permission guard injection
//!
//! Puts an authorization step in front of an existing step list. The guard
//! takes ordinal 0 so existing `step-{n}-...` names never need renumbering.

use serde::{Deserialize, Serialize};

use crate::wiring::{step_name, workflow_input_expr, TaskRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheckConfig {
    /// Registry task that performs the check
    pub task_name: String,
    /// Permission literal handed to the task
    pub permission: String,
    /// Workflow input field carrying the user id
    pub user_id_field: String,
}

impl PermissionCheckConfig {
    pub fn new(
        task_name: impl Into<String>,
        permission: impl Into<String>,
        user_id_field: impl Into<String>,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            permission: permission.into(),
            user_id_field: user_id_field.into(),
        }
    }
}

pub fn generate_permission_check_task(config: &PermissionCheckConfig) -> TaskRef {
    let mut step = TaskRef::new(step_name(0, &config.task_name), config.task_name.as_str());
    step.input
        .insert("permission".to_string(), config.permission.clone());
    step.input
        .insert("userId".to_string(), workflow_input_expr(&config.user_id_field));
    step
}

/// Prepend `guard` and make the original first step depend on it.
///
/// The first step keeps its existing dependencies; the guard name is
/// appended unless already present. All other steps are untouched.
pub fn insert_permission_check(steps: Vec<TaskRef>, guard: TaskRef) -> Vec<TaskRef> {
    let mut result = Vec::with_capacity(steps.len() + 1);
    let guard_name = guard.name.clone();
    result.push(guard);

    let mut steps = steps.into_iter();
    if let Some(mut first) = steps.next() {
        if !first.depends_on.contains(&guard_name) {
            first.depends_on.push(guard_name);
        }
        result.push(first);
    }
    result.extend(steps);
    result
}
