//! CLI tests for the `tb` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `tb` isolated from the user's config, data and API key
fn tb(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tb").expect("tb binary builds");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("NO_COLOR", "1")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(home: &TempDir) -> std::path::PathBuf {
    let path = home.path().join("taskbot.yml");
    let db = home.path().join("tasks.db");
    std::fs::write(
        &path,
        format!("log-level: warn\nstorage:\n  db-path: {}\n", db.display()),
    )
    .expect("write config");
    path
}

#[test]
fn test_extract_without_key_uses_fallback() {
    let home = TempDir::new().unwrap();
    tb(&home)
        .args(["extract", "Fix the header logo. It is blurry", "Update the footer link"])
        .assert()
        .success()
        .stdout(predicate::str::contains("via: fallback"))
        .stdout(predicate::str::contains("1. Fix the header logo\n"))
        .stdout(predicate::str::contains("2. Update the footer link"));
}

#[test]
fn test_extract_json_output() {
    let home = TempDir::new().unwrap();
    tb(&home)
        .args(["extract", "--format", "json", "Call the plumber!"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"via\": \"fallback\""))
        .stdout(predicate::str::contains("\"Call the plumber\""));
}

#[test]
fn test_extract_requires_text() {
    let home = TempDir::new().unwrap();
    tb(&home).arg("extract").assert().failure();
}

#[test]
fn test_tasks_on_empty_database() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tb(&home)
        .arg("--config")
        .arg(&config)
        .args(["tasks", "--user", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks found"));
}

#[test]
fn test_tasks_rejects_unknown_status() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tb(&home)
        .arg("--config")
        .arg(&config)
        .args(["tasks", "--user", "7", "--status", "someday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown task status"));
}

#[test]
fn test_projects_on_empty_database() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tb(&home)
        .arg("--config")
        .arg(&config)
        .args(["projects", "--user", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No projects found"));
}

#[test]
fn test_run_without_token_fails() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home);
    tb(&home)
        .arg("--config")
        .arg(&config)
        .arg("run")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELEGRAM_BOT_TOKEN"));
}
