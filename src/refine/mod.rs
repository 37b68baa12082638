//! # Refinement Engine
//!
//! Drives a bounded validate → classify → fix → re-validate loop over a
//! workflow document until the validator accepts it or the loop can prove it
//! is not getting anywhere.
//!
//! Termination checks run in a fixed order after every re-validation:
//!
//! 1. `success` - the candidate is valid
//! 2. `oscillation_detected` - the error signature was seen before
//! 3. `no_progress` - the error count did not strictly decrease
//! 4. `unfixable_errors` - nothing left that a fix can address
//!
//! When the bound is exhausted first, the run ends with `max_iterations`.
//! All loop bookkeeping lives in a per-call [`LoopState`], so one engine can
//! serve any number of concurrent runs.

pub mod classify;
pub mod fix;
pub mod similarity;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::schema::TaskDefinition;
use crate::validator::{ValidationIssue, ValidationResult, WorkflowValidator};

pub use classify::{classify, is_fixable, ErrorKind};
pub use fix::{apply_fixes, is_repairable, FixPass};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Why a refinement run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Success,
    MaxIterations,
    OscillationDetected,
    NoProgress,
    UnfixableErrors,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Success => "success",
            TerminationReason::MaxIterations => "max_iterations",
            TerminationReason::OscillationDetected => "oscillation_detected",
            TerminationReason::NoProgress => "no_progress",
            TerminationReason::UnfixableErrors => "unfixable_errors",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One repair attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementAttempt {
    /// 1-based
    pub iteration: usize,
    /// Error messages the fixes were derived from
    pub errors: Vec<String>,
    pub fixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementOutcome {
    pub valid: bool,
    /// Last candidate produced, valid or not
    pub yaml: String,
    pub termination_reason: TerminationReason,
    /// Number of repair attempts (== `history.len()`)
    pub iterations: usize,
    pub history: Vec<RefinementAttempt>,
    /// Errors reported for `yaml` by the final validation
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RefinementConfig {
    pub max_iterations: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Bookkeeping for a single `refine_workflow` call
struct LoopState {
    yaml: String,
    errors: Vec<ValidationIssue>,
    seen_signatures: HashSet<String>,
    history: Vec<RefinementAttempt>,
}

impl LoopState {
    fn new(yaml: &str, initial: &ValidationResult) -> Self {
        let mut seen_signatures = HashSet::new();
        seen_signatures.insert(initial.signature());
        Self {
            yaml: yaml.to_string(),
            errors: initial.errors.clone(),
            seen_signatures,
            history: Vec::new(),
        }
    }

    /// Feed one re-validation result. Returns the reason to stop, if any.
    fn observe(
        &mut self,
        candidate: String,
        result: ValidationResult,
        available_tasks: &[TaskDefinition],
    ) -> Option<TerminationReason> {
        let previous_count = self.errors.len();
        self.yaml = candidate;
        self.errors = result.errors;

        if result.valid {
            return Some(TerminationReason::Success);
        }
        // `insert` is false when the signature was already present
        if !self.seen_signatures.insert(crate::validator::error_signature(&self.errors)) {
            return Some(TerminationReason::OscillationDetected);
        }
        if self.errors.len() >= previous_count {
            return Some(TerminationReason::NoProgress);
        }
        if !self.has_repairable(available_tasks) {
            return Some(TerminationReason::UnfixableErrors);
        }
        None
    }

    fn has_repairable(&self, available_tasks: &[TaskDefinition]) -> bool {
        self.errors.iter().any(|e| is_repairable(e, available_tasks))
    }

    fn finish(self, valid: bool, reason: TerminationReason) -> RefinementOutcome {
        RefinementOutcome {
            valid,
            yaml: self.yaml,
            termination_reason: reason,
            iterations: self.history.len(),
            history: self.history,
            errors: self.errors.into_iter().map(|e| e.message).collect(),
        }
    }
}

/// Iterative workflow repair on top of a [`WorkflowValidator`]
#[derive(Clone)]
pub struct RefinementEngine {
    validator: Arc<dyn WorkflowValidator>,
    config: RefinementConfig,
}

impl RefinementEngine {
    pub fn new(validator: Arc<dyn WorkflowValidator>) -> Self {
        Self::with_config(validator, RefinementConfig::default())
    }

    pub fn with_config(validator: Arc<dyn WorkflowValidator>, config: RefinementConfig) -> Self {
        Self { validator, config }
    }

    pub fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Repair `yaml` until the validator accepts it or the loop terminates.
    ///
    /// `max_iterations` overrides the configured bound for this call. Workflow
    /// problems are reported through the outcome; `Err` means the validator
    /// itself failed and the run was abandoned.
    #[instrument(skip_all, fields(validator = self.validator.name(), bytes = yaml.len()))]
    pub async fn refine_workflow(
        &self,
        yaml: &str,
        available_tasks: &[TaskDefinition],
        max_iterations: Option<usize>,
    ) -> Result<RefinementOutcome> {
        let max_iterations = max_iterations.unwrap_or(self.config.max_iterations);

        let initial = self.validator.validate(yaml).await?;
        let mut state = LoopState::new(yaml, &initial);

        if initial.valid {
            info!("Workflow valid on first validation");
            return Ok(state.finish(true, TerminationReason::Success));
        }
        if !state.has_repairable(available_tasks) {
            info!(errors = state.errors.len(), "No fixable errors, giving up");
            return Ok(state.finish(false, TerminationReason::UnfixableErrors));
        }

        for iteration in 1..=max_iterations {
            let pass = apply_fixes(&state.yaml, &state.errors, available_tasks);
            debug!(iteration, fixes = pass.fixes.len(), "Applied fixes");

            state.history.push(RefinementAttempt {
                iteration,
                errors: state.errors.iter().map(|e| e.message.clone()).collect(),
                fixes: pass.fixes,
            });

            let result = self.validator.validate(&pass.yaml).await?;
            let valid = result.valid;
            debug!(iteration, errors = result.errors.len(), "Re-validated candidate");

            if let Some(reason) = state.observe(pass.yaml, result, available_tasks) {
                info!(iteration, %reason, "Refinement finished");
                return Ok(state.finish(valid, reason));
            }
        }

        info!(max_iterations, "Refinement hit the iteration bound");
        Ok(state.finish(false, TerminationReason::MaxIterations))
    }
}
