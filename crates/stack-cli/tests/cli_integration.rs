//! CLI subprocess integration tests.
//!
//! These tests invoke the `stack` binary as a subprocess and only exercise
//! paths that never reach docker, compose, git, or aws.

use std::path::Path;
use std::process::Command;

const COMPOSE: &str = r"
services:
  web:
    build: ./apps/web
    image: stack/web
";

fn stack_bin(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stack"));
    cmd.arg("--root").arg(root);
    // Skip tool probing: nothing here shells out.
    cmd.env("STACK_SKIP_PREREQS", "1");
    cmd.env_remove("STACK_LOG");
    cmd
}

fn write_stack(dir: &Path, stack: &str) {
    std::fs::write(dir.join("docker-compose.yml"), COMPOSE).unwrap();
    std::fs::write(dir.join("stack.yml"), stack).unwrap();
}

fn write_build_context(dir: &Path) {
    let web = dir.join("apps/web");
    std::fs::create_dir_all(&web).unwrap();
    std::fs::write(web.join("Dockerfile"), "FROM scratch\n").unwrap();
}

#[test]
fn cli_version_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let output = stack_bin(dir.path()).arg("--version").output().unwrap();
    assert!(output.status.success(), "stack --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stack"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = stack_bin(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["reup", "checkout", "secrets", "packages", "doctor"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_missing_manifests_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = stack_bin(dir.path()).arg("status").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration error"), "stderr: {stderr}");
}

#[test]
fn cli_check_validates_build_context() {
    let dir = tempfile::tempdir().unwrap();
    write_stack(dir.path(), "stack: {}\n");

    let output = stack_bin(dir.path()).arg("check").output().unwrap();
    assert_eq!(output.status.code(), Some(1), "missing context must fail");

    write_build_context(dir.path());
    let output = stack_bin(dir.path()).arg("check").output().unwrap();
    assert!(output.status.success(), "valid context must pass");
}

#[test]
fn cli_unknown_service_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    write_stack(dir.path(), "stack: {}\n");
    let output = stack_bin(dir.path())
        .args(["clone", "ghost", "main"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ghost"), "stderr: {stderr}");
}

#[test]
fn cli_checkout_new_branch_needs_subtree() {
    let dir = tempfile::tempdir().unwrap();
    write_stack(dir.path(), "stack: {}\n");
    let output = stack_bin(dir.path())
        .args(["checkout", "web", "-b", "feature"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("run clone first"), "stderr: {stderr}");
}

#[test]
fn cli_secrets_keeps_existing_env_file() {
    let dir = tempfile::tempdir().unwrap();
    write_stack(dir.path(), "stack:\n  secrets:\n    name: dev/stack\n");
    std::fs::write(dir.path().join(".env"), "KEEP=1\n").unwrap();

    let output = stack_bin(dir.path()).arg("secrets").output().unwrap();
    assert!(output.status.success(), "existing .env is not an error");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("already exists"), "stdout: {stdout}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".env")).unwrap(),
        "KEEP=1\n"
    );
}

#[test]
fn cli_secrets_without_configuration_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_stack(dir.path(), "stack: {}\n");
    let output = stack_bin(dir.path()).arg("secrets").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join(".env").exists());
}

#[test]
fn cli_completions_for_bash() {
    let dir = tempfile::tempdir().unwrap();
    let output = stack_bin(dir.path())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("stack"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("man");
    let output = stack_bin(dir.path())
        .arg("man-pages")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(out.join("stack.1").is_file());
    assert!(out.join("stack-reup.1").is_file());
}

#[test]
fn cli_doctor_json_reports_unhealthy_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output = stack_bin(dir.path())
        .args(["doctor", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["healthy"], false);
    assert!(report["checks"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["name"] == "stack_manifest" && c["status"] == "fail"));
}
