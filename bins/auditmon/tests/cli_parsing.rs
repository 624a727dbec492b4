//! CLI argument parsing tests for the auditmon command.
//!
//! These tests exercise argument parsing only; none of them reach the
//! kernel.

use assert_cmd::Command;
use predicates::prelude::*;

fn auditmon_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_auditmon"))
}

mod global_flags {
    use super::*;

    #[test]
    fn test_help() {
        auditmon_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Linux audit control"));
    }

    #[test]
    fn test_version() {
        auditmon_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("auditmon"));
    }

    #[test]
    fn test_invalid_subcommand() {
        auditmon_cmd()
            .arg("invalid_command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn test_no_wait_help_warns() {
        auditmon_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--no-wait"))
            .stdout(predicate::str::contains("will likely fail with EAGAIN"));
    }

    #[test]
    fn test_invalid_timeout() {
        auditmon_cmd()
            .args(["--timeout-ms", "soon", "status"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }
}

mod audit_commands {
    use super::*;

    #[test]
    fn test_set_failure_help() {
        auditmon_cmd()
            .args(["set-failure", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("printk"));
    }

    #[test]
    fn test_set_failure_rejects_unknown_mode() {
        auditmon_cmd()
            .args(["set-failure", "reboot"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }

    #[test]
    fn test_set_rate_limit_requires_value() {
        auditmon_cmd().arg("set-rate-limit").assert().failure();
    }

    #[test]
    fn test_add_rule_help() {
        auditmon_cmd()
            .args(["add-rule", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("FIELD:OP:VALUE"));
    }
}

mod watch_command {
    use super::*;

    #[test]
    fn test_watch_requires_pid() {
        auditmon_cmd().arg("watch").assert().failure();
    }

    #[test]
    fn test_watch_rejects_unknown_event() {
        auditmon_cmd()
            .args(["watch", "1", "--events", "clone"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }

    #[test]
    fn test_watch_help() {
        auditmon_cmd()
            .args(["watch", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Event kinds to report"));
    }
}
