//! Task registry loading
//!
//! Reads the task catalog from YAML (or JSON) files. Two shapes are accepted,
//! and may be mixed across files:
//!
//! ```yaml
//! # plain list
//! - name: get-user
//!   inputSchema: { type: object, properties: { id: { type: string } } }
//!   outputSchema: { type: object, properties: { email: { type: string } } }
//! ```
//!
//! ```yaml
//! # one WorkflowTask resource per document
//! apiVersion: workflow.example.com/v1
//! kind: WorkflowTask
//! metadata:
//!   name: get-user
//! spec:
//!   inputSchema: { ... }
//!   outputSchema: { ... }
//! ```

use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, WeaveError};
use crate::schema::{SchemaDefinition, TaskDefinition};

pub const TASK_RESOURCE_KIND: &str = "WorkflowTask";

#[derive(Deserialize)]
struct TaskResource {
    metadata: ResourceMetadata,
    #[serde(default)]
    spec: TaskResourceSpec,
}

#[derive(Deserialize)]
struct ResourceMetadata {
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TaskResourceSpec {
    #[serde(default)]
    input_schema: SchemaDefinition,
    #[serde(default)]
    output_schema: SchemaDefinition,
}

impl From<TaskResource> for TaskDefinition {
    fn from(resource: TaskResource) -> Self {
        TaskDefinition::new(
            resource.metadata.name,
            resource.spec.input_schema,
            resource.spec.output_schema,
        )
    }
}

/// Parse every task definition in `text`, in document order
pub fn load_tasks_from_str(text: &str) -> Result<Vec<TaskDefinition>> {
    let mut tasks = Vec::new();

    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        collect_document(value, &mut tasks)?;
    }

    Ok(dedup_by_name(tasks))
}

fn collect_document(value: Value, tasks: &mut Vec<TaskDefinition>) -> Result<()> {
    match value {
        Value::Null => {}
        Value::Sequence(items) => {
            for item in items {
                tasks.push(serde_yaml::from_value(item)?);
            }
        }
        Value::Mapping(_) => match value.get("kind").and_then(Value::as_str) {
            Some(TASK_RESOURCE_KIND) => {
                let resource: TaskResource = serde_yaml::from_value(value)?;
                tasks.push(resource.into());
            }
            Some(other) => debug!(kind = other, "Skipping non-task document"),
            None => tasks.push(serde_yaml::from_value(value)?),
        },
        _ => debug!("Skipping scalar document"),
    }
    Ok(())
}

/// First definition of a name wins
fn dedup_by_name(tasks: Vec<TaskDefinition>) -> Vec<TaskDefinition> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            let fresh = seen.insert(task.name.clone());
            if !fresh {
                warn!(task = %task.name, "Duplicate task definition ignored");
            }
            fresh
        })
        .collect()
}

/// Loads task definitions from a directory of `*.yaml` / `*.yml` files
pub struct TaskRegistryLoader {
    base_path: PathBuf,
}

impl TaskRegistryLoader {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Scan the directory (non-recursive), files in name order
    pub fn scan(&self) -> Result<Vec<TaskDefinition>> {
        if !self.base_path.is_dir() {
            return Err(WeaveError::Registry {
                path: self.base_path.clone(),
                details: "not a directory".to_string(),
            });
        }

        let mut paths = Vec::new();
        for extension in ["yaml", "yml"] {
            let pattern = self
                .base_path
                .join(format!("*.{}", extension))
                .to_string_lossy()
                .to_string();

            let entries = glob::glob(&pattern).map_err(|e| WeaveError::Registry {
                path: self.base_path.clone(),
                details: e.to_string(),
            })?;

            for entry in entries {
                let path = entry.map_err(|e| WeaveError::Registry {
                    path: e.path().to_path_buf(),
                    details: e.to_string(),
                })?;
                paths.push(path);
            }
        }
        paths.sort();

        let mut tasks = Vec::new();
        for path in &paths {
            tasks.extend(load_file(path)?);
        }
        debug!(files = paths.len(), tasks = tasks.len(), "Scanned task registry");

        Ok(dedup_by_name(tasks))
    }
}

/// Load a registry from a single file or a directory
pub fn load_tasks(path: impl AsRef<Path>) -> Result<Vec<TaskDefinition>> {
    let path = path.as_ref();
    if path.is_dir() {
        TaskRegistryLoader::new(path).scan()
    } else {
        load_file(path)
    }
}

fn load_file(path: &Path) -> Result<Vec<TaskDefinition>> {
    let content = std::fs::read_to_string(path).map_err(|e| WeaveError::Registry {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    load_tasks_from_str(&content).map_err(|e| WeaveError::Registry {
        path: path.to_path_buf(),
        details: e.to_string(),
    })
}
