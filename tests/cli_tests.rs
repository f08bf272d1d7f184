//! CLI integration tests for the comment-dispatch binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// A command with the well-known variables cleared so the host environment
/// cannot leak into assertions.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("comment-dispatch").expect("Failed to find binary");
    for var in [
        "PORT",
        "WEBHOOK_VERIFY_TOKEN",
        "GITHUB_TOKEN",
        "RUST_LOG",
        "COMMENT_DISPATCH__PORT",
        "COMMENT_DISPATCH__WEBHOOK_PATH",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Instagram comment webhook that triggers GitHub repository dispatch",
        ))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("show-config"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_show_config_defaults() {
    cmd()
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 3000"))
        .stdout(predicate::str::contains("/api/webhook"))
        .stdout(predicate::str::contains("scheduled_posting"));
}

#[test]
fn test_show_config_redacts_secrets() {
    cmd()
        .arg("show-config")
        .env("WEBHOOK_VERIFY_TOKEN", "very-secret-token")
        .env("GITHUB_TOKEN", "ghp_do_not_print")
        .env("PORT", "8123")
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 8123"))
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("very-secret-token").not())
        .stdout(predicate::str::contains("ghp_do_not_print").not());
}

#[test]
fn test_show_config_reads_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(file, "webhook_path = \"/hooks/ig\"\n\n[github]\nrepo = \"workflows\"").unwrap();

    cmd()
        .arg("--config")
        .arg(file.path())
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("/hooks/ig"))
        .stdout(predicate::str::contains("workflows"));
}

#[test]
fn test_missing_config_file_fails() {
    cmd()
        .args(["--config", "does/not/exist.toml", "show-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_invalid_port_fails() {
    cmd()
        .arg("show-config")
        .env("PORT", "not-a-number")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load settings"));
}

#[test]
fn test_quiet_conflicts_with_verbose() {
    cmd()
        .args(["-q", "-v", "show-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_empty_port_uses_default() {
    cmd()
        .arg("show-config")
        .env("PORT", "")
        .env("WEBHOOK_VERIFY_TOKEN", "")
        .assert()
        .success()
        .stdout(predicate::str::contains("port: 3000"));
}

#[test]
fn test_log_flags_are_accepted() {
    cmd()
        .args(["-qq", "--no-timestamps", "show-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("webhook_path"));

    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-timestamps"));
}
