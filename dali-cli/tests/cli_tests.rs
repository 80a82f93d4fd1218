//! Command line tests for the dali binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn dali() -> Command {
    let mut cmd = Command::cargo_bin("dali").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_plan_pattern_rounds_up() {
    dali()
        .args(["plan", "--size", "10000", "--strategy", "pattern"])
        .assert()
        .success()
        .stdout(predicate::str::contains("content-length:  12288"))
        .stdout(predicate::str::contains("buffers:         3"));
}

#[test]
fn test_plan_exact() {
    dali()
        .args(["plan", "--size", "10000", "--strategy", "pattern", "--exact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("content-length:  10000"));
}

#[test]
fn test_plan_rejects_bad_size() {
    dali()
        .args(["plan", "--size", "ten"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_check_prints_routes() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
size = "1k"
strategy = "zero"

[[locations]]
path = "/pattern"
strategy = "pattern"
"#
    )
    .unwrap();

    dali()
        .args(["check", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 routes"))
        .stdout(predicate::str::contains("/pattern"))
        .stdout(predicate::str::contains("1024"));
}

#[test]
fn test_check_missing_file() {
    dali()
        .args(["check", "--config", "/nonexistent/dali.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_serve_requires_size() {
    dali()
        .env_remove("DALI_SIZE")
        .env_remove("DALI_CONFIG")
        .args(["serve", "--listen", "127.0.0.1:0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no size configured"));
}
