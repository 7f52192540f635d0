#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn provision(logs: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("frappe-provision").unwrap();
    cmd.env("FRAPPE_PROVISION_LOG_DIR", logs.path())
        .env_remove("FRAPPE_PROVISION_CONFIG");
    cmd
}

/// Contents of today's log for `phase`, if one was written.
fn phase_log(dir: &Path, phase: &str) -> Option<String> {
    let prefix = format!("frappe-provision-{phase}-");
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        .map(|e| std::fs::read_to_string(e.path()).unwrap())
}

// ---------------------------------------------------------------------------
// usage
// ---------------------------------------------------------------------------

#[test]
fn help_exits_zero() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("root-phase"))
        .stdout(predicate::str::contains("user-phase"));
}

#[test]
fn short_help_on_subcommand_lists_all_four_flags() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["run", "-h"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--user"))
        .stdout(predicate::str::contains("--db-password"))
        .stdout(predicate::str::contains("--site"))
        .stdout(predicate::str::contains("--admin-password"));
}

#[test]
fn root_phase_accepts_only_user() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["root-phase", "-u", "svc", "-s", "apps.localhost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
    assert!(phase_log(logs.path(), "root").is_none());
}

#[test]
fn unknown_flag_exits_one_with_usage() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["run", "--bogus"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

// ---------------------------------------------------------------------------
// missing parameters
// ---------------------------------------------------------------------------

#[test]
fn root_phase_without_user_logs_error_and_exits_one() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .arg("root-phase")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "ERROR: missing required argument: --user",
        ));

    let log = phase_log(logs.path(), "root").expect("root log written");
    assert!(log.contains("ERROR: missing required argument: --user"));
    assert!(!log.contains("[1/4]"));
}

#[test]
fn failure_is_printed_once_on_the_console() {
    let logs = TempDir::new().unwrap();
    let out = provision(&logs)
        .arg("root-phase")
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();

    let stderr = String::from_utf8(out).unwrap();
    let errors: Vec<&str> = stderr.lines().filter(|l| l.contains("ERROR")).collect();
    assert_eq!(errors.len(), 1, "stderr was:\n{stderr}");
    assert!(errors[0].starts_with('['));
    assert!(errors[0].ends_with("ERROR: missing required argument: --user"));
}

#[test]
fn unreadable_profile_is_logged_for_the_phase() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["--config", "/nonexistent/profile.yaml", "root-phase", "-u", "svc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ERROR: invalid profile: cannot read"));

    let log = phase_log(logs.path(), "root").expect("root log written");
    assert!(log.contains("ERROR: invalid profile: cannot read /nonexistent/profile.yaml"));
    assert!(!log.contains("[1/4]"));
}

#[test]
fn invalid_profile_is_logged_before_any_parameter_check() {
    let logs = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profile.yaml");
    std::fs::write(&path, "bench:\n  migrations: [a.b, a.b]\n").unwrap();

    provision(&logs)
        .arg("--config")
        .arg(&path)
        .arg("user-phase")
        .assert()
        .code(1);

    let log = phase_log(logs.path(), "user").expect("user log written");
    assert!(log.contains("more than once"));
}

#[test]
fn run_without_site_stops_before_root_phase() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["run", "-u", "svc", "-p", "root1", "-a", "admin1"])
        .assert()
        .code(1);

    let log = phase_log(logs.path(), "orchestrator").expect("orchestrator log written");
    assert!(log.contains("ERROR: missing required argument: --site"));
    assert!(phase_log(logs.path(), "root").is_none());
}

#[test]
fn run_with_empty_password_is_missing() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["run", "-u", "svc", "-p", "", "-s", "apps.localhost", "-a", "admin1"])
        .assert()
        .code(1);

    let log = phase_log(logs.path(), "orchestrator").unwrap();
    assert!(log.contains("--db-password"));
}

#[test]
fn user_phase_as_someone_else_exits_one() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args([
            "user-phase",
            "-u",
            "zz-not-me",
            "-p",
            "root1",
            "-s",
            "apps.localhost",
            "-a",
            "admin1",
        ])
        .assert()
        .code(1);

    let log = phase_log(logs.path(), "user").unwrap();
    assert!(log.contains("ERROR:"));
    assert!(!log.contains("install node runtime"));
}

// ---------------------------------------------------------------------------
// plan
// ---------------------------------------------------------------------------

#[test]
fn plan_json_lists_both_phases_with_secrets_masked() {
    let logs = TempDir::new().unwrap();
    let out = provision(&logs)
        .args([
            "plan",
            "--json",
            "-u",
            "svc",
            "-p",
            "root1",
            "-s",
            "apps.localhost",
            "-a",
            "admin1",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("root1"));
    assert!(!text.contains("admin1"));
    assert!(text.contains("********"));

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["root_phase"].as_array().unwrap().len(), 4);
    let user = value["user_phase"].as_array().unwrap();
    assert_eq!(user[0]["name"], "install node runtime");
    assert_eq!(user.last().unwrap()["name"], "enable developer mode");
}

#[test]
fn plan_text_is_a_table() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["plan", "-u", "svc", "-p", "x", "-s", "apps.localhost", "-a", "y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PHASE"))
        .stdout(predicate::str::contains("create site apps.localhost"));
}

#[test]
fn plan_rejects_invalid_site() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["plan", "-u", "svc", "-p", "x", "-s", "Bad Site", "-a", "y"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid site"));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn default_profile_validates_with_warning_only() {
    let logs = TempDir::new().unwrap();
    provision(&logs)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning]"));
}

#[test]
fn config_init_then_show_uses_file() {
    let logs = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profile.yaml");

    provision(&logs)
        .args(["config", "init"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    // A second init refuses to clobber.
    provision(&logs)
        .args(["config", "init"])
        .arg(&path)
        .assert()
        .code(1);

    let edited = std::fs::read_to_string(&path)
        .unwrap()
        .replace("frappe-bench\n", "my-bench\n");
    std::fs::write(&path, edited).unwrap();

    provision(&logs)
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("workspace: my-bench"));
}

#[test]
fn invalid_profile_fails_validation() {
    let logs = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profile.yaml");
    std::fs::write(&path, "bench:\n  migrations: [a.b, a.b]\n").unwrap();

    provision(&logs)
        .arg("--config")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("more than once"));
}
