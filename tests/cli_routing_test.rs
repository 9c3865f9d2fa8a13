//! Integration tests for window/tab/workspace routing and remembered state.

#![cfg(unix)]

mod common;

use common::TestEnv;
use predicates::prelude::*;

// ==================== Window Resolution ====================

#[test]
fn test_explicit_window_must_be_live() {
    let env = TestEnv::new();
    env.rpflow()
        .args(["exec", "-e", "context", "--window", "7"])
        .env("FAKE_RP_WINDOWS", r#"[{"windowID": 1}, {"windowID": 2}]"#)
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "rpflow error: requested window 7 not found; available: [1, 2]",
        ));

    assert!(env.state().is_none());
}

#[test]
fn test_no_windows_is_an_error() {
    let env = TestEnv::new();
    env.rpflow()
        .args(["exec", "-e", "context"])
        .env("FAKE_RP_WINDOWS", "[]")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no Repo Prompt windows are open"));
}

#[test]
fn test_multiple_windows_need_a_choice() {
    let env = TestEnv::new();
    env.rpflow()
        .args(["exec", "-e", "context"])
        .env("FAKE_RP_WINDOWS", r#"[{"windowID": 1}, {"windowID": 2}]"#)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("pass --window"));
}

#[test]
fn test_remembered_window_is_reused() {
    let env = TestEnv::new();
    env.write_state(r#"{"last_window": 2, "last_tab": "T2", "last_workspace": "Work"}"#);

    env.rpflow()
        .args(["exec", "-e", "context"])
        .env("FAKE_RP_WINDOWS", r#"[{"windowID": 1}, {"windowID": 2}]"#)
        .assert()
        .success();

    let calls = env.rp_calls();
    assert_eq!(calls[2], r#"-w 2 -t T2 -e workspace switch "Work""#);
    assert_eq!(calls[3], "-w 2 -t T2 -e context");
}

#[test]
fn test_stale_remembered_window_falls_back_to_single_live() {
    let env = TestEnv::new();
    env.write_state(r#"{"last_window": 9}"#);

    env.rpflow().args(["exec", "-e", "context"]).assert().success();

    assert_eq!(env.state().unwrap()["last_window"], 1);
}

#[test]
fn test_corrupt_state_is_ignored() {
    let env = TestEnv::new();
    env.write_state("{not json");

    env.rpflow()
        .args(["exec", "-e", "context"])
        .env("RPFLOW_LOG", "warn")
        .assert()
        .success()
        .stderr(predicate::str::contains("ignoring malformed state file"));

    assert_eq!(env.state().unwrap()["last_tab"], "T1");
}

// ==================== Tabs ====================

#[test]
fn test_unknown_tab_fails() {
    let env = TestEnv::new();
    env.rpflow()
        .args(["exec", "-e", "context", "--tab", "Nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            r#"tab 'Nope' not found; available: ["T1", "T2"]"#,
        ));
}

// ==================== Strict Mode ====================

#[test]
fn test_strict_requires_every_flag() {
    let env = TestEnv::new();
    env.rpflow()
        .args(["exec", "-e", "context", "--strict", "--window", "1", "--tab", "T1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("strict mode requires --workspace"));

    // Strict failures happen before rp-cli is touched.
    assert!(env.rp_calls().is_empty());
}

#[test]
fn test_strict_ignores_remembered_routing() {
    let env = TestEnv::new();
    env.write_state(r#"{"last_window": 2, "last_tab": "T2", "last_workspace": "Old"}"#);

    env.rpflow()
        .args([
            "exec",
            "-e",
            "context",
            "--strict",
            "--window",
            "1",
            "--tab",
            "T1",
            "--workspace",
            "New",
        ])
        .env("FAKE_RP_WINDOWS", r#"[{"windowID": 1}, {"windowID": 2}]"#)
        .assert()
        .success();

    let state = env.state().unwrap();
    assert_eq!(state["last_window"], 1);
    assert_eq!(state["last_workspace"], "New");
}

// ==================== Workspace Switch ====================

#[test]
fn test_already_on_workspace_is_not_an_error() {
    let env = TestEnv::new();
    env.rpflow()
        .args(["exec", "-e", "context"])
        .env("FAKE_RP_WORKSPACE", "already")
        .assert()
        .success()
        .stdout(predicate::str::contains("context ok"));
}

#[test]
fn test_workspace_switch_failure_aborts() {
    let env = TestEnv::new();
    env.rpflow()
        .args(["exec", "-e", "context"])
        .env("FAKE_RP_WORKSPACE", "fail")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("workspace not found"));

    // windows, tabs, workspace switch; the command itself never runs
    assert_eq!(env.rp_calls().len(), 3);
    assert!(env.state().is_none());
}

// ==================== Config ====================

#[test]
fn test_config_default_tab_and_workspace() {
    let env = TestEnv::new();
    env.write_config("default-tab \"T2\"\ndefault-workspace \"Docs\"\n");

    env.rpflow().args(["exec", "-e", "context"]).assert().success();

    let calls = env.rp_calls();
    assert_eq!(calls[2], r#"-w 1 -t T2 -e workspace switch "Docs""#);
}

#[test]
fn test_invalid_config_exits_two() {
    let env = TestEnv::new();
    env.write_config("profile \"turbo\"\n");

    env.rpflow()
        .args(["exec", "-e", "context"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid config"));

    assert!(env.rp_calls().is_empty());
}
