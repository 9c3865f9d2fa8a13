//! Invocation of the external `rp-cli` binary.
//!
//! [`Runner`] is the seam between orchestration and the real subprocess:
//! [`ProcessRunner`] spawns `rp-cli` with a deadline, and [`RpCli`] layers the
//! typed operations (exec, tool calls, listings, workspace switch) on top of
//! any runner. Runners never retry; retry policy belongs to the commands.

pub mod command;
pub mod parser;
pub mod process;

pub use command::{RpCommand, split_paths};
pub use parser::{TabInfo, WindowInfo, parse_tabs, parse_windows};
pub use process::ProcessRunner;

use crate::{Error, Result, TIMEOUT_EXIT_CODE};
use std::time::Duration;

/// Default name of the wrapped binary.
pub const DEFAULT_BINARY: &str = "rp-cli";

/// Timeout used for window and tab listings.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Signal number of SIGKILL.
pub const SIGKILL: i32 = 9;

const ALREADY_ON_WORKSPACE: &str = "already on workspace";

/// Outcome of a single `rp-cli` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Exit code (124 on timeout, 128 + signal when killed by a signal)
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Whether rpflow killed the process because it hit its deadline
    pub timed_out: bool,
    /// Terminating signal, if the process died from one
    pub signal: Option<i32>,
    /// Wall time spent waiting for the process
    pub elapsed: Duration,
    /// Set when a workspace switch reported "already on workspace"
    pub already_on_workspace: bool,
}

impl RunResult {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// A timed-out result carrying whatever output was captured before the kill.
    pub fn timed_out(
        binary: &str,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let mut stderr = stderr.into();
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!(
            "TIMEOUT: {} exceeded {}s",
            binary,
            timeout.as_secs()
        ));
        Self {
            code: TIMEOUT_EXIT_CODE,
            stdout: stdout.into(),
            stderr,
            timed_out: true,
            signal: None,
            elapsed: timeout,
            already_on_workspace: false,
        }
    }

    /// A result for a process terminated by `signal`.
    pub fn killed(signal: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: 128 + signal,
            stderr: stderr.into(),
            signal: Some(signal),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    pub fn is_timeout(&self) -> bool {
        self.timed_out || self.code == TIMEOUT_EXIT_CODE
    }

    pub fn killed_by_sigkill(&self) -> bool {
        self.signal == Some(SIGKILL)
    }

    /// Timeouts and SIGKILLs are the only failures retry and fallback act on.
    pub fn is_timeout_or_kill(&self) -> bool {
        self.is_timeout() || self.killed_by_sigkill()
    }

    /// stdout and stderr joined by a newline.
    pub fn merged_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Classify this result for reports and failure hints.
    pub fn classify(&self, builder_related: bool) -> Classification {
        if self.is_success() {
            if self.already_on_workspace {
                return Classification::WorkspaceAlreadySelected;
            }
            return Classification::Ok;
        }
        if self.timed_out {
            return if builder_related {
                Classification::BuilderTimeout
            } else {
                Classification::Timeout
            };
        }
        match self.signal {
            Some(SIGKILL) => Classification::KilledSigkill,
            Some(sig) => Classification::KilledSignal(sig),
            None => Classification::Error,
        }
    }
}

/// Outcome category of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ok,
    WorkspaceAlreadySelected,
    Timeout,
    BuilderTimeout,
    KilledSigkill,
    KilledSignal(i32),
    Error,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Ok => write!(f, "ok"),
            Classification::WorkspaceAlreadySelected => write!(f, "workspace_already_selected"),
            Classification::Timeout => write!(f, "timeout"),
            Classification::BuilderTimeout => write!(f, "builder_timeout"),
            Classification::KilledSigkill => write!(f, "killed_sigkill"),
            Classification::KilledSignal(sig) => write!(f, "killed_sig{}", sig),
            Classification::Error => write!(f, "error"),
        }
    }
}

/// Something that can run `rp-cli` with an argument list and a deadline.
pub trait Runner {
    /// Run the binary once. Timeouts are reported in the `RunResult`, not as errors.
    fn run(&self, args: &[String], timeout: Duration) -> Result<RunResult>;

    /// Name or path of the binary being run.
    fn binary_name(&self) -> &str;
}

/// Typed `rp-cli` operations over a [`Runner`].
#[derive(Debug)]
pub struct RpCli<R: Runner> {
    runner: R,
}

impl<R: Runner> RpCli<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run raw arguments.
    pub fn run(&self, args: &[String], timeout: Duration) -> Result<RunResult> {
        self.runner.run(args, timeout)
    }

    /// Run an exec command string (`-e`) against an optional window and tab.
    pub fn exec(
        &self,
        command: &str,
        window: Option<i64>,
        tab: Option<&str>,
        timeout: Duration,
        raw_json: bool,
    ) -> Result<RunResult> {
        let mut args = Vec::new();
        if raw_json {
            args.push("--raw-json".to_string());
        }
        push_routing(&mut args, window, tab);
        args.push("-e".to_string());
        args.push(command.to_string());
        self.run(&args, timeout)
    }

    /// Invoke a tool (`-c`) with an optional JSON argument (`-j`).
    ///
    /// `json_arg` may be inline JSON, `@file` or `@-`; it is passed through untouched.
    pub fn call(
        &self,
        tool: &str,
        json_arg: &str,
        window: Option<i64>,
        tab: Option<&str>,
        timeout: Duration,
    ) -> Result<RunResult> {
        let mut args = Vec::new();
        push_routing(&mut args, window, tab);
        args.push("-c".to_string());
        args.push(tool.to_string());
        if !json_arg.is_empty() {
            args.push("-j".to_string());
            args.push(json_arg.to_string());
        }
        self.run(&args, timeout)
    }

    /// Fetch the tool schema, optionally for a single group.
    pub fn tools_schema(&self, group: Option<&str>, timeout: Duration) -> Result<RunResult> {
        let arg = match group {
            Some(g) if !g.is_empty() => format!("--tools-schema={}", g),
            _ => "--tools-schema".to_string(),
        };
        self.run(&[arg], timeout)
    }

    /// List the open windows.
    pub fn list_windows(&self, timeout: Duration) -> Result<Vec<WindowInfo>> {
        let res = self.exec("windows", None, None, timeout, true)?;
        if !res.is_success() {
            return Err(Error::Tool(failure_text(&res, "failed to list windows")));
        }
        parse_windows(&res.stdout)
    }

    /// List the tabs of a window.
    pub fn list_tabs(&self, window: Option<i64>, timeout: Duration) -> Result<Vec<TabInfo>> {
        let res = self.exec("tabs", window, None, timeout, true)?;
        if !res.is_success() {
            return Err(Error::Tool(failure_text(&res, "failed to list tabs")));
        }
        parse_tabs(&res.stdout)
    }

    /// Switch to `workspace`, treating "already on workspace" as success.
    ///
    /// The returned result has `code == 0` in both success cases so callers
    /// and reports see a clean stage; the idempotent case classifies as
    /// [`Classification::WorkspaceAlreadySelected`].
    pub fn switch_workspace(
        &self,
        workspace: &str,
        window: Option<i64>,
        tab: Option<&str>,
        timeout: Duration,
    ) -> Result<RunResult> {
        let command = RpCommand::workspace_switch(workspace).build();
        let mut res = self.exec(&command, window, tab, timeout, false)?;
        if res.is_success() {
            return Ok(res);
        }

        let merged = res.merged_output();
        if merged.to_lowercase().contains(ALREADY_ON_WORKSPACE) {
            tracing::debug!(workspace, code = res.code, "workspace already selected");
            res.code = 0;
            res.already_on_workspace = true;
            return Ok(res);
        }

        let trimmed = merged.trim();
        if trimmed.is_empty() {
            Err(Error::WorkspaceSwitch(format!(
                "workspace switch failed ({})",
                res.code
            )))
        } else {
            Err(Error::WorkspaceSwitch(trimmed.to_string()))
        }
    }
}

fn push_routing(args: &mut Vec<String>, window: Option<i64>, tab: Option<&str>) {
    if let Some(w) = window {
        args.push("-w".to_string());
        args.push(w.to_string());
    }
    if let Some(t) = tab.filter(|t| !t.is_empty()) {
        args.push("-t".to_string());
        args.push(t.to_string());
    }
}

fn failure_text(res: &RunResult, fallback: &str) -> String {
    let text = if res.stderr.is_empty() {
        res.stdout.trim()
    } else {
        res.stderr.trim()
    };
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}
