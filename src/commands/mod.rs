//! Command implementations for the rpflow CLI.
//!
//! Each command resolves its routing, switches the workspace, runs its
//! `rp-cli` stages and returns the process exit code. Errors abort the
//! command and are mapped to exit code 2 by the binary. Commands:
//! - `doctor` - Connectivity and routing probe
//! - `exec` / `call` / `tools-schema` / `export` - Single-stage passthroughs
//! - `plan-export` / `autopilot` - Builder runs with retry, fallback and resume
//! - `smoke` - Read-only health checks

mod builder;
mod doctor;
mod exec;
mod smoke;

pub use builder::{BuilderOptions, autopilot, plan_export};
pub use doctor::doctor;
pub use exec::{call, exec, export, tools_schema};
pub use smoke::{Check, run_checks, smoke};

use crate::Result;
use crate::config::{Settings, TimeoutKey, expand_home};
use crate::report::{ResumeRecord, RunReport};
use crate::routing::{
    Routing, RoutingRequest, check_strict, ensure_tab_exists, resolve_name, resolve_window,
};
use crate::rpcli::{LISTING_TIMEOUT, RpCli, RunResult, Runner};
use crate::state::{RpState, StateStore};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Everything a command needs to talk to rp-cli.
pub struct Context<R: Runner> {
    pub rp: RpCli<R>,
    pub store: StateStore,
    pub settings: Settings,
}

impl<R: Runner> Context<R> {
    pub fn new(rp: RpCli<R>, store: StateStore, settings: Settings) -> Self {
        Self {
            rp,
            store,
            settings,
        }
    }

    /// Timeout for `key`, honoring an explicit `--timeout`.
    pub fn timeout(&self, explicit: Option<u64>, key: TimeoutKey) -> Duration {
        self.settings.timeout(explicit, key)
    }
}

/// Resolve window, tab and workspace for this invocation.
///
/// Strict mode is checked before anything is listed, and it ignores the
/// remembered state entirely.
pub fn prepare_routing<R: Runner>(ctx: &Context<R>, request: &RoutingRequest) -> Result<Routing> {
    check_strict(request)?;
    let remembered = if request.strict {
        RpState::default()
    } else {
        ctx.store.load()
    };

    let windows = ctx.rp.list_windows(LISTING_TIMEOUT)?;
    let window = resolve_window(&windows, request.window, remembered.last_window)?;

    let tab = resolve_name(
        request.tab.as_deref(),
        remembered.last_tab.as_deref(),
        &ctx.settings.default_tab,
    );
    let tabs = ctx.rp.list_tabs(Some(window.value), LISTING_TIMEOUT)?;
    ensure_tab_exists(&tabs, &tab.value)?;

    let workspace = resolve_name(
        request.workspace.as_deref(),
        remembered.last_workspace.as_deref(),
        &ctx.settings.default_workspace,
    );

    tracing::debug!(
        window = window.value,
        window_source = %window.source,
        tab = %tab.value,
        tab_source = %tab.source,
        workspace = %workspace.value,
        workspace_source = %workspace.source,
        "resolved routing"
    );

    Ok(Routing {
        window,
        tab,
        workspace,
    })
}

/// Switch to the routed workspace and record the `workspace_switch` stage.
pub(crate) fn switch_workspace<R: Runner>(
    ctx: &Context<R>,
    routing: &Routing,
    timeout: Duration,
    report: &mut RunReport,
) -> Result<()> {
    let res = ctx.rp.switch_workspace(
        routing.workspace(),
        Some(routing.window()),
        Some(routing.tab()),
        timeout,
    )?;
    report.add_stage("workspace_switch", &res, false);
    Ok(())
}

/// Run an exec command against the routed window and tab.
pub(crate) fn exec_routed<R: Runner>(
    ctx: &Context<R>,
    routing: &Routing,
    command: &str,
    timeout: Duration,
    raw_json: bool,
) -> Result<RunResult> {
    ctx.rp.exec(
        command,
        Some(routing.window()),
        Some(routing.tab()),
        timeout,
        raw_json,
    )
}

/// Record a stage and print the failure hint when it did not succeed.
pub(crate) fn record_stage(
    report: &mut RunReport,
    name: &str,
    res: &RunResult,
    builder_related: bool,
) {
    report.add_stage(name, res, builder_related);
    emit_failure_hint(name, res, builder_related);
}

/// `rpflow stage <name>: <classification> (code=<N>)` on stderr.
pub(crate) fn emit_failure_hint(stage: &str, res: &RunResult, builder_related: bool) {
    if res.is_success() {
        return;
    }
    eprintln!(
        "rpflow stage {}: {} (code={})",
        stage,
        res.classify(builder_related),
        res.code
    );
}

/// Echo rp-cli's output: stdout to stdout, stderr to stderr.
pub(crate) fn print_output(res: &RunResult) {
    if !res.stdout.is_empty() {
        print!("{}", res.stdout);
    }
    if !res.stderr.is_empty() {
        eprint!("{}", res.stderr);
    }
}

/// Remember the routing after a successful command.
///
/// The state file is a convenience; failing to write it does not fail the
/// command.
pub(crate) fn remember<R: Runner>(ctx: &Context<R>, routing: &Routing) {
    if let Err(e) = ctx.store.remember(routing) {
        tracing::warn!(path = %ctx.store.path().display(), error = %e, "failed to save state");
    }
}

/// Delete a previous export so a stale file is never mistaken for output.
pub(crate) fn remove_existing(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed previous export");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Reuse an existing export in place of a failed run.
///
/// Returns whether the export was copied to `out`. The attempt is recorded
/// in the report whenever a source path was configured.
pub(crate) fn attempt_resume(
    source: Option<&Path>,
    out: &Path,
    report: &mut RunReport,
    reason: &str,
) -> Result<bool> {
    let Some(source) = source.filter(|s| !s.as_os_str().is_empty()) else {
        return Ok(false);
    };
    let source = expand_home(source);

    if !source.is_file() {
        tracing::info!(source = %source.display(), reason, "resume export not found");
        report.set_resume(ResumeRecord {
            attempted: true,
            used: false,
            reason: reason.to_string(),
            source: source.display().to_string(),
            destination: None,
            bytes: None,
            source_exists: Some(false),
        });
        return Ok(false);
    }

    if same_file(&source, out) {
        // Copying a file onto itself truncates it; the export is already in place.
        tracing::debug!(out = %out.display(), "resume export is already at the output path");
    } else {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, out)?;
    }
    let bytes = fs::metadata(out)?.len();

    tracing::info!(source = %source.display(), out = %out.display(), reason, "reused export");
    report.set_resume(ResumeRecord {
        attempted: true,
        used: true,
        reason: reason.to_string(),
        source: source.display().to_string(),
        destination: Some(out.display().to_string()),
        bytes: Some(bytes),
        source_exists: None,
    });
    eprintln!("rpflow resume: reused export from {}", source.display());
    Ok(true)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// `out_path`, `out_exists` and `out_bytes` report fields.
pub(crate) fn record_out_file(report: &mut RunReport, out: &Path) {
    let bytes = fs::metadata(out).ok().filter(|m| m.is_file()).map(|m| m.len());
    report.insert("out_path", out.display().to_string());
    report.insert("out_exists", bytes.is_some());
    report.insert("out_bytes", bytes.unwrap_or(0));
}

/// `timeout_seconds` and `profile` report fields.
pub(crate) fn record_timeout<R: Runner>(ctx: &Context<R>, report: &mut RunReport, timeout: Duration) {
    report.insert("timeout_seconds", timeout.as_secs());
    report.insert("profile", ctx.settings.profile().as_str());
}
