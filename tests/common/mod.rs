//! Common test utilities for rpflow integration tests.
//!
//! Provides `TestEnv`, which puts a scripted fake `rp-cli` on `PATH` and
//! points `RPFLOW_CONFIG_DIR` at a temporary directory so tests never touch
//! the user's `~/.config/rpflow/`.
//!
//! The fake is driven per command through environment variables:
//! - `FAKE_RP_WINDOWS` - JSON printed for `windows` (default one window, id 1)
//! - `FAKE_RP_WORKSPACE` - `already` or `fail` to change `workspace switch`
//! - `FAKE_RP_CONTEXT_EXIT` / `FAKE_RP_SCHEMA_EXIT` - exit codes of the checks
//! - `FAKE_RP_BUILDER` - `timeout` (sleeps), `kill` (SIGKILL) or `fail` (exit 3)
//! - `FAKE_RP_EXPORT` - `fail` to make `prompt export` exit 5
//!
//! Every invocation's arguments are appended to `rp.log` in the env.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

const FAKE_RP_CLI: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> "$FAKE_RP_LOG"

cmd=""
tool=""
raw=0
while [ $# -gt 0 ]; do
    case "$1" in
        --raw-json) raw=1 ;;
        --tools-schema*)
            echo '{"tools": []}'
            exit "${FAKE_RP_SCHEMA_EXIT:-0}"
            ;;
        -w|-t|-j) shift ;;
        -e) shift; cmd="$1" ;;
        -c) shift; tool="$1" ;;
    esac
    shift
done

if [ -n "$tool" ]; then
    echo "called $tool"
    exit 0
fi

case "$cmd" in
    windows)
        windows='[{"windowID": 1}]'
        if [ -n "$FAKE_RP_WINDOWS" ]; then windows="$FAKE_RP_WINDOWS"; fi
        printf '%s\n' "$windows"
        exit 0
        ;;
    tabs)
        if [ "$raw" = 1 ]; then
            echo '{"tabs": [{"name": "T1"}, {"name": "T2"}]}'
        else
            printf 'T1\nT2\n'
        fi
        exit 0
        ;;
    workspace\ switch*)
        case "$FAKE_RP_WORKSPACE" in
            already) echo "Already on workspace" >&2; exit 1 ;;
            fail) echo "workspace not found" >&2; exit 1 ;;
        esac
        echo "Switched workspace"
        exit 0
        ;;
    context*)
        code="${FAKE_RP_CONTEXT_EXIT:-0}"
        if [ "$code" != 0 ]; then echo "context unavailable" >&2; exit "$code"; fi
        echo "context ok"
        exit 0
        ;;
esac

case "$cmd" in
    *builder\ *)
        case "$FAKE_RP_BUILDER" in
            timeout) echo "building"; exec sleep 10 ;;
            kill) kill -9 $$ ;;
            fail) echo "builder failed" >&2; exit 3 ;;
        esac
        ;;
esac

case "$cmd" in
    *prompt\ export*)
        if [ "$FAKE_RP_EXPORT" = fail ]; then echo "export failed" >&2; exit 5; fi
        out=$(printf '%s' "$cmd" | sed -n 's/.*prompt export "\([^"]*\)".*/\1/p')
        printf 'exported prompt\n' > "$out"
        echo "Exported to $out"
        exit 0
        ;;
esac

echo "ran: $cmd"
"#;

/// An isolated environment with a fake `rp-cli` and its own config dir.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    /// Create the temp layout and install the fake `rp-cli`.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["bin", "config", "work"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let fake = dir.path().join("bin").join("rp-cli");
        fs::write(&fake, FAKE_RP_CLI).unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir }
    }

    /// Get a Command for the rpflow binary wired to the fake rp-cli.
    ///
    /// Everything is set per command, so tests stay parallel-safe.
    pub fn rpflow(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_rpflow"));
        cmd.current_dir(self.work_dir());
        cmd.env(
            "PATH",
            format!("{}:/usr/bin:/bin", self.dir.path().join("bin").display()),
        );
        cmd.env("RPFLOW_CONFIG_DIR", self.config_dir());
        cmd.env("FAKE_RP_LOG", self.log_path());
        cmd.env_remove("RPFLOW_RP_CLI");
        cmd.env_remove("RPFLOW_LOG");
        cmd
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("rp.log")
    }

    /// Argument lines of every fake rp-cli invocation so far.
    pub fn rp_calls(&self) -> Vec<String> {
        fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    pub fn state_path(&self) -> PathBuf {
        self.config_dir().join("state.json")
    }

    /// Parsed state.json, or None if it was never written.
    pub fn state(&self) -> Option<serde_json::Value> {
        let text = fs::read_to_string(self.state_path()).ok()?;
        Some(serde_json::from_str(&text).unwrap())
    }

    pub fn write_state(&self, json: &str) {
        fs::write(self.state_path(), json).unwrap();
    }

    pub fn write_config(&self, kdl: &str) {
        fs::write(self.config_dir().join("config.kdl"), kdl).unwrap();
    }

    /// Read a run report written with `--report-json`.
    pub fn read_report(&self, path: &Path) -> serde_json::Value {
        let text = fs::read_to_string(path).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
