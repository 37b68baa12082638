//! # Refinement Engine Tests
//!
//! Drives the refinement loop with scripted validators:
//!
//! 1. Termination reasons and their check order
//! 2. Iteration bound and validator call counts
//! 3. Transport failures propagate as errors
//! 4. End-to-end repair with the offline validator

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use taskweave::validator::{MockValidator, ValidationIssue, ValidationResult, WorkflowValidator};
use taskweave::{
    LocalValidator, RefinementConfig, RefinementEngine, SchemaDefinition, TaskDefinition,
    TerminationReason, WeaveError,
};

// ============================================================================
// TEST HELPERS
// ============================================================================

fn registry() -> Vec<TaskDefinition> {
    ["get-user", "send-email", "archive-message"]
        .into_iter()
        .map(|n| TaskDefinition::new(n, SchemaDefinition::object(), SchemaDefinition::object()))
        .collect()
}

fn errors(messages: &[&str]) -> ValidationResult {
    ValidationResult::with_errors(messages.iter().map(|m| ValidationIssue::new(*m)).collect())
}

fn engine_with(mock: &Arc<MockValidator>) -> RefinementEngine {
    RefinementEngine::new(mock.clone())
}

const DRAFT: &str = r#"apiVersion: workflow.example.com/v1
kind: Workflow
metadata:
  name: notify
spec:
  steps:
    - name: step-1-get-user
      taskRef: get-usr
    - name: step-2-send-email
      taskRef: sendemail
      dependsOn: [step-1-get-user]
      input:
        to: "{{ steps.step-1-get-user.output.email"
"#;

/// Errors on the n-th call (1-based), valid otherwise
struct FailingOnCall {
    fail_on: usize,
    calls: AtomicUsize,
    inner: MockValidator,
}

#[async_trait]
impl WorkflowValidator for FailingOnCall {
    fn name(&self) -> &str {
        "failing"
    }

    async fn validate(&self, yaml: &str) -> taskweave::Result<ValidationResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(WeaveError::GatewayStatus {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        self.inner.validate(yaml).await
    }
}

// ============================================================================
// TERMINATION REASONS
// ============================================================================

#[tokio::test]
async fn test_valid_on_first_call() {
    let mock = Arc::new(MockValidator::new());
    let outcome = engine_with(&mock)
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap();

    assert!(outcome.valid);
    assert_eq!(outcome.termination_reason, TerminationReason::Success);
    assert!(outcome.history.is_empty());
    assert_eq!(outcome.yaml, DRAFT);
}

#[tokio::test]
async fn test_only_unfixable_errors_on_first_call() {
    let mock = Arc::new(MockValidator::with_responses(vec![errors(&[
        "Circular dependency detected: a → b → a",
        "Type mismatch: expected string, got integer",
        "YAML parse error: did not find expected key",
    ])]));
    let outcome = engine_with(&mock)
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap();

    assert!(!outcome.valid);
    assert_eq!(outcome.termination_reason, TerminationReason::UnfixableErrors);
    assert!(outcome.history.is_empty());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_missing_field_message_is_not_a_task_name() {
    let mock = Arc::new(MockValidator::with_responses(vec![errors(&[
        "Step 'b' is missing taskRef field",
    ])]));
    let outcome = engine_with(&mock)
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap();

    assert_eq!(outcome.termination_reason, TerminationReason::UnfixableErrors);
    assert!(outcome.history.is_empty());
    assert_eq!(outcome.yaml, DRAFT);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_strictly_decreasing_errors_reach_success() {
    let responses = vec![
        errors(&[
            "Task 'get-usr' not found",
            "Task 'sendemail' not found",
            "Malformed template expression: '{{ steps.step-1-get-user.output.email'",
        ]),
        errors(&[
            "Task 'sendemail' not found",
            "Malformed template expression: '{{ steps.step-1-get-user.output.email'",
        ]),
        errors(&["Task 'sendemail' not found"]),
        ValidationResult::ok(),
    ];
    let non_final = responses.len() - 1;
    let mock = Arc::new(MockValidator::with_responses(responses));

    let outcome = engine_with(&mock)
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap();

    assert!(outcome.valid);
    assert_eq!(outcome.termination_reason, TerminationReason::Success);
    assert_eq!(outcome.history.len(), non_final);
    assert_eq!(outcome.iterations, non_final);

    let iterations: Vec<usize> = outcome.history.iter().map(|a| a.iteration).collect();
    assert_eq!(iterations, vec![1, 2, 3]);
    assert_eq!(outcome.history[0].errors.len(), 3);
    assert!(outcome.history[0]
        .fixes
        .contains(&"Replace taskRef \"get-usr\" with \"get-user\"".to_string()));
    assert!(outcome.history[0]
        .fixes
        .iter()
        .any(|f| f.starts_with("Normalize template delimiters")));

    // Returned text is the last candidate sent to the validator
    assert_eq!(mock.get_requests().last(), Some(&outcome.yaml));
    assert!(outcome.yaml.contains("taskRef: get-user"));
    assert!(outcome.yaml.contains("taskRef: send-email"));
    assert!(outcome.yaml.contains("{{ steps.step-1-get-user.output.email }}"));
}

#[tokio::test]
async fn test_repeated_errors_oscillate_regardless_of_bound() {
    for bound in [1, 10] {
        let mock = Arc::new(MockValidator::with_responses(vec![
            errors(&["Task 'get-usr' not found"]),
            errors(&["Task 'get-usr' not found"]),
        ]));
        let outcome = engine_with(&mock)
            .refine_workflow(DRAFT, &registry(), Some(bound))
            .await
            .unwrap();

        assert_eq!(
            outcome.termination_reason,
            TerminationReason::OscillationDetected
        );
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(mock.call_count(), 2);
    }
}

#[tokio::test]
async fn test_signature_ignores_error_order() {
    let mock = Arc::new(MockValidator::with_responses(vec![
        errors(&["Task 'get-usr' not found", "Task 'sendemail' not found"]),
        errors(&["Task 'sendemail' not found", "Task 'get-usr' not found"]),
    ]));
    let outcome = engine_with(&mock)
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap();
    assert_eq!(
        outcome.termination_reason,
        TerminationReason::OscillationDetected
    );
}

#[tokio::test]
async fn test_constant_error_count_stops_early() {
    // Same count, new identities every time
    let varying: Vec<ValidationResult> = (0..10)
        .map(|i| errors(&[format!("Task 'get-user-{i}' not found").as_str()]))
        .collect();
    // Same count, same identity every time
    let constant = vec![errors(&["Task 'get-usr' not found"])];

    for responses in [varying, constant] {
        let mock = Arc::new(MockValidator::with_responses(responses));
        let outcome = engine_with(&mock)
            .refine_workflow(DRAFT, &registry(), Some(5))
            .await
            .unwrap();

        assert!(mock.call_count() <= 5);
        assert!(matches!(
            outcome.termination_reason,
            TerminationReason::NoProgress | TerminationReason::OscillationDetected
        ));
    }
}

#[tokio::test]
async fn test_unfixable_remainder_after_progress() {
    let mock = Arc::new(MockValidator::with_responses(vec![
        errors(&[
            "Task 'get-usr' not found",
            "Circular dependency detected: a → b → a",
        ]),
        errors(&["Circular dependency detected: a → b → a"]),
    ]));
    let outcome = engine_with(&mock)
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap();

    assert_eq!(outcome.termination_reason, TerminationReason::UnfixableErrors);
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(
        outcome.errors,
        vec!["Circular dependency detected: a → b → a"]
    );
}

#[tokio::test]
async fn test_bound_exhausted() {
    let mock = Arc::new(MockValidator::with_responses(vec![
        errors(&[
            "Task 'get-usr' not found",
            "Task 'sendemail' not found",
            "Task 'archive-msg' not found",
        ]),
        errors(&["Task 'get-usr' not found", "Task 'sendemail' not found"]),
        errors(&["Task 'get-usr' not found"]),
    ]));
    let engine = RefinementEngine::with_config(mock.clone(), RefinementConfig { max_iterations: 2 });

    let outcome = engine.refine_workflow(DRAFT, &registry(), None).await.unwrap();
    assert_eq!(outcome.termination_reason, TerminationReason::MaxIterations);
    assert_eq!(outcome.history.len(), 2);
    assert_eq!(mock.call_count(), 3);
    assert!(!outcome.valid);
}

// ============================================================================
// TRANSPORT FAILURES
// ============================================================================

#[tokio::test]
async fn test_initial_transport_error_propagates() {
    let mock = Arc::new(MockValidator::unreachable());
    let err = engine_with(&mock)
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WeaveError::GatewayStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_mid_loop_transport_error_propagates() {
    let validator = Arc::new(FailingOnCall {
        fail_on: 2,
        calls: AtomicUsize::new(0),
        inner: MockValidator::with_responses(vec![errors(&["Task 'get-usr' not found"])]),
    });
    let engine = RefinementEngine::new(validator);

    let err = engine
        .refine_workflow(DRAFT, &registry(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WeaveError::GatewayStatus { status: 502, .. }));
}

// ============================================================================
// OFFLINE END-TO-END
// ============================================================================

#[tokio::test]
async fn test_local_validator_repairs_draft() {
    let tasks = registry();
    let engine = RefinementEngine::new(Arc::new(LocalValidator::new(&tasks)));

    let outcome = engine.refine_workflow(DRAFT, &tasks, None).await.unwrap();

    assert!(outcome.valid, "{:?}", outcome.errors);
    assert_eq!(outcome.termination_reason, TerminationReason::Success);
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.history[0].fixes.len(), 3);
    assert!(LocalValidator::new(&tasks).check(&outcome.yaml).valid);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let tasks = registry();
    let engine = RefinementEngine::new(Arc::new(LocalValidator::new(&tasks)));
    let clean = "spec:\n  steps:\n    - name: a\n      taskRef: get-user\n";

    let (broken, fine) = tokio::join!(
        engine.refine_workflow(DRAFT, &tasks, None),
        engine.refine_workflow(clean, &tasks, None),
    );

    let broken = broken.unwrap();
    let fine = fine.unwrap();
    assert!(broken.valid);
    assert_eq!(broken.history.len(), 1);
    assert!(fine.valid);
    assert!(fine.history.is_empty());
}
