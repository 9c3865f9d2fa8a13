//! Builder commands: plan-export and autopilot.
//!
//! Both run the plan builder and export its prompt, with the same recovery
//! ladder when the builder misbehaves:
//!
//! 1. One retry with a longer deadline (`--retry-on-timeout`)
//! 2. A plain selection export (`--fallback-export-on-timeout`)
//! 3. Copying a previous export (`--resume-from-export`)
//!
//! Retry and fallback only react to timeouts and SIGKILL; an ordinary
//! non-zero exit goes straight to the resume step.

use super::{
    Context, attempt_resume, emit_failure_hint, exec_routed, prepare_routing, print_output,
    record_out_file, record_stage, record_timeout, remember, remove_existing, run_checks,
    switch_workspace,
};
use crate::config::{TimeoutKey, retry_timeout};
use crate::report::RunReport;
use crate::routing::{Routing, RoutingRequest};
use crate::rpcli::{RpCommand, Runner, split_paths};
use crate::{CHECK_FAILED_EXIT_CODE, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Flags shared by plan-export and autopilot.
#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    /// Comma-separated paths to select
    pub select_set: String,
    pub task: String,
    pub out: PathBuf,
    pub timeout: Option<u64>,
    pub retry_on_timeout: bool,
    pub retry_timeout: Option<u64>,
    pub retry_timeout_scale: Option<f64>,
    pub fallback_export_on_timeout: bool,
    pub resume_from_export: Option<PathBuf>,
}

/// Stage names and resume reasons for one builder command.
struct Flow {
    plan_stage: &'static str,
    retry_stage: &'static str,
    timeout_reason: &'static str,
    failed_reason: &'static str,
}

const PLAN_EXPORT: Flow = Flow {
    plan_stage: "plan_export",
    retry_stage: "plan_export_retry",
    timeout_reason: "plan_export_timeout_without_fallback",
    failed_reason: "plan_export_failed",
};

const AUTOPILOT: Flow = Flow {
    plan_stage: "autopilot_plan_export",
    retry_stage: "autopilot_plan_retry",
    timeout_reason: "autopilot_timeout_without_fallback",
    failed_reason: "autopilot_plan_failed",
};

const FALLBACK_STAGE: &str = "fallback_export";
const FALLBACK_FAILED_REASON: &str = "fallback_export_failed_after_timeout";
const PREFLIGHT_FAILED_REASON: &str = "preflight_failed";

/// Run the plan builder for `--task` and export the result to `--out`.
pub fn plan_export<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    request: &RoutingRequest,
    opts: &BuilderOptions,
) -> Result<i32> {
    let routing = prepare_routing(ctx, request)?;
    report.set_routing(&routing);
    let timeout = ctx.timeout(opts.timeout, TimeoutKey::PlanExport);
    record_timeout(ctx, report, timeout);

    switch_workspace(ctx, &routing, timeout, report)?;
    remove_existing(&opts.out)?;

    let code = run_builder(ctx, report, &routing, opts, timeout, &PLAN_EXPORT)?;
    record_out_file(report, &opts.out);

    if code == 0 {
        remember(ctx, &routing);
    }
    Ok(code)
}

/// Preflight checks, then the plan-export flow.
///
/// A failing preflight never reaches the builder: the command either
/// resumes from a previous export or exits 1.
pub fn autopilot<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    request: &RoutingRequest,
    opts: &BuilderOptions,
    preflight_timeout: Option<u64>,
) -> Result<i32> {
    let routing = prepare_routing(ctx, request)?;
    report.set_routing(&routing);
    let timeout = ctx.timeout(opts.timeout, TimeoutKey::Autopilot);
    let preflight_timeout = ctx.timeout(preflight_timeout, TimeoutKey::Preflight);
    record_timeout(ctx, report, timeout);
    report.insert("preflight_timeout_seconds", preflight_timeout.as_secs());

    switch_workspace(ctx, &routing, timeout, report)?;

    let checks = run_checks(ctx, &routing, preflight_timeout)?;
    for check in &checks {
        println!("preflight:{}: {}", check.name, check.status());
        report.add_stage(&format!("preflight_{}", check.name), &check.result, false);
    }

    let failed: Vec<&str> = checks
        .iter()
        .filter(|c| !c.passed())
        .map(|c| c.name)
        .collect();

    if !failed.is_empty() {
        for check in checks.iter().filter(|c| !c.passed()) {
            eprintln!("\n--- preflight {} output ---", check.name);
            emit_failure_hint(&format!("preflight_{}", check.name), &check.result, false);
            print_output(&check.result);
        }
        tracing::info!(?failed, "preflight failed; builder skipped");
        report.insert("failed_checks", failed);

        let resumed = attempt_resume(
            opts.resume_from_export.as_deref(),
            &opts.out,
            report,
            PREFLIGHT_FAILED_REASON,
        )?;
        report.insert("resume_used", resumed);
        record_out_file(report, &opts.out);

        if resumed {
            remember(ctx, &routing);
            return Ok(0);
        }
        return Ok(CHECK_FAILED_EXIT_CODE);
    }

    remove_existing(&opts.out)?;

    let code = run_builder(ctx, report, &routing, opts, timeout, &AUTOPILOT)?;
    record_out_file(report, &opts.out);

    if code == 0 {
        remember(ctx, &routing);
    }
    Ok(code)
}

/// Builder run plus the retry, fallback and resume ladder. Returns the exit code.
fn run_builder<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    routing: &Routing,
    opts: &BuilderOptions,
    timeout: Duration,
    flow: &Flow,
) -> Result<i32> {
    let paths = split_paths(&opts.select_set);
    let out = opts.out.to_string_lossy();
    let command = RpCommand::plan_export(&paths, &opts.task, &out).build();

    let mut res = exec_routed(ctx, routing, &command, timeout, false)?;
    record_stage(report, flow.plan_stage, &res, true);

    let mut retry_secs = None;
    if opts.retry_on_timeout && (res.timed_out || res.killed_by_sigkill()) {
        let scale = ctx.settings.retry_scale(opts.retry_timeout_scale);
        let retry = retry_timeout(opts.retry_timeout, scale, timeout);
        tracing::info!(
            stage = flow.retry_stage,
            retry_timeout_secs = retry.as_secs(),
            "retrying builder"
        );

        res = exec_routed(ctx, routing, &command, retry, false)?;
        report
            .add_stage(flow.retry_stage, &res, true)
            .extra
            .insert("retry_timeout_seconds".to_string(), retry.as_secs().into());
        emit_failure_hint(flow.retry_stage, &res, true);
        retry_secs = Some(retry.as_secs());
    }
    report.insert("retry_used", retry_secs.is_some());
    report.insert("retry_timeout_seconds", retry_secs);

    let mut fallback_used = false;
    let mut resume_used = false;

    let code = if res.is_timeout_or_kill() && opts.fallback_export_on_timeout {
        fallback_used = true;
        tracing::info!(stage = FALLBACK_STAGE, "builder timed out; exporting selection");

        let fallback = RpCommand::selection_export(&paths, &out).build();
        let fb = exec_routed(ctx, routing, &fallback, timeout, false)?;
        record_stage(report, FALLBACK_STAGE, &fb, false);

        if fb.is_success() {
            print_output(&fb);
            0
        } else {
            resume_used = attempt_resume(
                opts.resume_from_export.as_deref(),
                &opts.out,
                report,
                FALLBACK_FAILED_REASON,
            )?;
            if resume_used { 0 } else { fb.code }
        }
    } else if !res.is_success() {
        let reason = if res.timed_out {
            flow.timeout_reason
        } else {
            flow.failed_reason
        };
        resume_used =
            attempt_resume(opts.resume_from_export.as_deref(), &opts.out, report, reason)?;
        if resume_used { 0 } else { res.code }
    } else {
        print_output(&res);
        0
    };

    report.insert("fallback_used", fallback_used);
    report.insert("resume_used", resume_used);
    Ok(code)
}
