//! Workflow scaffolding
//!
//! Wraps wired steps into a complete workflow document:
//!
//! ```yaml
//! apiVersion: workflow.example.com/v1
//! kind: Workflow
//! metadata:
//!   name: notify-user
//! spec:
//!   description: ...
//!   input: <first task's input schema>
//!   output:
//!     messageId: $.steps.step-2-send-email.outputs.messageId
//!   steps: [...]
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::chain::TaskChain;
use crate::error::Result;
use crate::guard::{generate_permission_check_task, insert_permission_check, PermissionCheckConfig};
use crate::schema::SchemaDefinition;
use crate::wiring::{generate_task_refs, step_output_expr, TaskRef};

pub const WORKFLOW_API_VERSION: &str = "workflow.example.com/v1";
pub const WORKFLOW_KIND: &str = "Workflow";

#[derive(Debug, Clone, Default)]
pub struct ScaffoldOptions {
    pub workflow_name: String,
    pub description: Option<String>,
}

impl ScaffoldOptions {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowScaffold {
    pub api_version: String,
    pub kind: String,
    pub metadata: WorkflowMetadata,
    pub spec: WorkflowSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input: SchemaDefinition,
    pub output: IndexMap<String, String>,
    pub steps: Vec<TaskRef>,
}

/// Build the workflow document for a chain.
///
/// `spec.input` is the first task's input schema verbatim; `spec.output`
/// exposes every output property of the last task. An empty chain yields an
/// empty input contract, no outputs and no steps.
pub fn scaffold_workflow(chain: &TaskChain, options: &ScaffoldOptions) -> WorkflowScaffold {
    let steps = generate_task_refs(chain);

    let input = chain
        .first()
        .map(|t| t.input_schema.clone())
        .unwrap_or_default();

    let output = match (chain.last(), steps.last()) {
        (Some(task), Some(last_step)) => task
            .output_schema
            .properties
            .keys()
            .map(|field| (field.clone(), step_output_expr(&last_step.name, field)))
            .collect(),
        _ => IndexMap::new(),
    };

    WorkflowScaffold {
        api_version: WORKFLOW_API_VERSION.to_string(),
        kind: WORKFLOW_KIND.to_string(),
        metadata: WorkflowMetadata {
            name: options.workflow_name.clone(),
        },
        spec: WorkflowSpec {
            description: options.description.clone(),
            input,
            output,
            steps,
        },
    }
}

impl WorkflowScaffold {
    /// Gate every step behind a permission check step
    pub fn with_permission_check(mut self, config: &PermissionCheckConfig) -> Self {
        let guard = generate_permission_check_task(config);
        let steps = std::mem::take(&mut self.spec.steps);
        self.spec.steps = insert_permission_check(steps, guard);
        self
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
