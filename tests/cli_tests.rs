//! Integration tests for the Taskweave CLI
//!
//! These tests run the actual CLI binary and verify output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const REGISTRY: &str = r#"
- name: get-user
  inputSchema:
    type: object
    properties:
      userId: { type: string }
    required: [userId]
  outputSchema:
    type: object
    properties:
      email: { type: string }
- name: send-email
  inputSchema:
    type: object
    properties:
      to: { type: string }
    required: [to]
  outputSchema:
    type: object
    properties:
      messageId: { type: integer }
- name: archive-message
  inputSchema:
    type: object
    properties:
      messageId: { type: integer }
    required: [messageId]
"#;

const BROKEN_WORKFLOW: &str = r#"apiVersion: workflow.example.com/v1
kind: Workflow
metadata:
  name: notify
spec:
  steps:
    - name: step-1-get-user
      taskRef: get-usr
    - name: step-2-send-email
      taskRef: send-email
      dependsOn: [step-1-get-user]
      input:
        to: "{{{ steps.step-1-get-user.outputs.email }}}"
"#;

/// Get the binary to test, isolated from the user's config and environment
fn taskweave_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("taskweave").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("WORKFLOW_GATEWAY_URL")
        .env_remove("WORKFLOW_GATEWAY_TOKEN")
        .env_remove("TASKWEAVE_MAX_ITERATIONS")
        .env_remove("RUST_LOG");
    cmd
}

fn write_registry(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("tasks.yaml");
    fs::write(&path, REGISTRY).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    taskweave_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chains"))
        .stdout(predicate::str::contains("scaffold"))
        .stdout(predicate::str::contains("refine"));
}

// ============================================================================
// Chains
// ============================================================================

#[test]
fn test_chains_text_output() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);

    taskweave_cmd(&home)
        .args(["chains", "--length", "3", "--registry"])
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "get-user → send-email → archive-message",
        ));
}

#[test]
fn test_chains_json_output() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);

    let output = taskweave_cmd(&home)
        .args(["chains", "--length", "2", "--to", "archive-message", "--json", "--registry"])
        .arg(&registry)
        .output()
        .unwrap();
    assert!(output.status.success());

    let chains: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        chains,
        serde_json::json!([{
            "tasks": ["send-email", "archive-message"],
            "links": [[{"from": "messageId", "to": "messageId"}]],
        }])
    );
}

// ============================================================================
// Scaffold + Validate
// ============================================================================

#[test]
fn test_scaffold_then_validate() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);
    let workflow = home.path().join("notify.yaml");

    taskweave_cmd(&home)
        .args(["scaffold", "--tasks", "get-user,send-email", "--name", "notify", "--registry"])
        .arg(&registry)
        .arg("--output")
        .arg(&workflow)
        .assert()
        .success();

    let yaml = fs::read_to_string(&workflow).unwrap();
    assert!(yaml.contains("name: notify"));
    assert!(yaml.contains("$.steps.step-1-get-user.outputs.email"));

    taskweave_cmd(&home)
        .arg("validate")
        .arg(&workflow)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_scaffold_with_guard() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);

    taskweave_cmd(&home)
        .args([
            "scaffold",
            "--tasks",
            "get-user,send-email",
            "--name",
            "guarded",
            "--guard-task",
            "check-permission",
            "--permission",
            "email:send",
            "--user-id-field",
            "userId",
            "--registry",
        ])
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::contains("name: step-0-check-permission"))
        .stdout(predicate::str::contains("$.input.userId"));
}

#[test]
fn test_scaffold_incompatible_tasks_fails() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);

    taskweave_cmd(&home)
        .args(["scaffold", "--tasks", "get-user,archive-message", "--name", "bad", "--registry"])
        .arg(&registry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot feed"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_validate_reports_errors() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);
    let workflow = home.path().join("broken.yaml");
    fs::write(&workflow, BROKEN_WORKFLOW).unwrap();

    taskweave_cmd(&home)
        .arg("validate")
        .arg(&workflow)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("2 error(s)"))
        .stderr(predicate::str::contains("TASK_NOT_FOUND"));
}

// ============================================================================
// Refine
// ============================================================================

#[test]
fn test_refine_local_repairs_file() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);
    let workflow = home.path().join("broken.yaml");
    let fixed = home.path().join("fixed.yaml");
    fs::write(&workflow, BROKEN_WORKFLOW).unwrap();

    taskweave_cmd(&home)
        .arg("refine")
        .arg(&workflow)
        .arg("--local")
        .arg("--registry")
        .arg(&registry)
        .arg("--output")
        .arg(&fixed)
        .assert()
        .success()
        .stderr(predicate::str::contains("Replace taskRef \"get-usr\" with \"get-user\""));

    let yaml = fs::read_to_string(&fixed).unwrap();
    assert!(yaml.contains("taskRef: get-user"));
    assert!(yaml.contains("\"{{ steps.step-1-get-user.outputs.email }}\""));
}

#[test]
fn test_refine_json_outcome() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);
    let workflow = home.path().join("broken.yaml");
    fs::write(&workflow, BROKEN_WORKFLOW).unwrap();

    let output = taskweave_cmd(&home)
        .arg("refine")
        .arg(&workflow)
        .args(["--local", "--json", "--registry"])
        .arg(&registry)
        .output()
        .unwrap();
    assert!(output.status.success());

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["valid"], true);
    assert_eq!(outcome["terminationReason"], "success");
    assert_eq!(outcome["iterations"], 1);
}

#[test]
fn test_refine_unfixable_exits_nonzero() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);
    let workflow = home.path().join("cycle.yaml");
    fs::write(
        &workflow,
        r#"spec:
  steps:
    - name: a
      taskRef: get-user
      dependsOn: [b]
    - name: b
      taskRef: send-email
      dependsOn: [a]
"#,
    )
    .unwrap();

    taskweave_cmd(&home)
        .arg("refine")
        .arg(&workflow)
        .arg("--local")
        .arg("--registry")
        .arg(&registry)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unfixable_errors"));
}

#[test]
fn test_refine_without_gateway_fails() {
    let home = TempDir::new().unwrap();
    let registry = write_registry(&home);
    let workflow = home.path().join("broken.yaml");
    fs::write(&workflow, BROKEN_WORKFLOW).unwrap();

    taskweave_cmd(&home)
        .arg("refine")
        .arg(&workflow)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No gateway URL configured"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_missing_registry_fails() {
    let home = TempDir::new().unwrap();

    taskweave_cmd(&home)
        .args(["chains", "--length", "2", "--registry", "nope.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load task registry"));
}
