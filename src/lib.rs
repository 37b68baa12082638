//! Taskweave - workflow synthesis and self-healing refinement
//!
//! Synthesis turns a task catalog into workflow drafts:
//! [`compat`] decides which tasks can feed which, [`chain`] enumerates
//! compatible sequences, [`wiring`] turns a chain into steps with data-flow
//! expressions, [`scaffold`] wraps them in a workflow document and [`guard`]
//! prepends a permission check.
//!
//! Refinement ([`refine`]) repairs any workflow text against a
//! [`validator::WorkflowValidator`] until it is accepted or provably stuck.

pub mod chain;
pub mod compat;
pub mod config;
pub mod error;
pub mod guard;
pub mod refine;
pub mod registry;
pub mod scaffold;
pub mod schema;
pub mod validator;
pub mod wiring;

pub use chain::{find_compatible_chains, ChainQuery, TaskChain};
pub use compat::{
    analyze_task_compatibility, is_schema_compatible, AffinityTable, CompatibilityResult,
    FieldMapping,
};
pub use config::{GatewayConfig, WeaveConfig};
pub use error::{FixSuggestion, Result, WeaveError};
pub use guard::{generate_permission_check_task, insert_permission_check, PermissionCheckConfig};
pub use refine::{
    RefinementAttempt, RefinementConfig, RefinementEngine, RefinementOutcome, TerminationReason,
};
pub use registry::{load_tasks, load_tasks_from_str, TaskRegistryLoader};
pub use scaffold::{scaffold_workflow, ScaffoldOptions, WorkflowScaffold};
pub use schema::{PropertySchema, SchemaDefinition, TaskDefinition};
pub use validator::{
    GatewayValidator, LocalValidator, MockValidator, ValidationIssue, ValidationResult,
    WorkflowValidator,
};
pub use wiring::{generate_task_refs, TaskRef};
