//! Read-only health checks, used by `smoke` and as the autopilot preflight.

use super::{
    Context, emit_failure_hint, exec_routed, prepare_routing, print_output, record_timeout,
    remember, switch_workspace,
};
use crate::config::TimeoutKey;
use crate::report::RunReport;
use crate::routing::{Routing, RoutingRequest};
use crate::rpcli::{RunResult, Runner};
use crate::{CHECK_FAILED_EXIT_CODE, Result};
use std::time::Duration;

const CONTEXT_CHECK: &str = "context --include tokens,selection,prompt --path-display relative";

/// Outcome of one check.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub result: RunResult,
}

impl Check {
    pub fn passed(&self) -> bool {
        self.result.is_success()
    }

    /// `ok` or `fail`.
    pub fn status(&self) -> &'static str {
        if self.passed() { "ok" } else { "fail" }
    }
}

/// Run the tabs, context and tools-schema checks against the routed tab.
///
/// Every check runs even when an earlier one fails.
pub fn run_checks<R: Runner>(
    ctx: &Context<R>,
    routing: &Routing,
    timeout: Duration,
) -> Result<Vec<Check>> {
    let tabs = exec_routed(ctx, routing, "tabs", timeout, false)?;
    let context = exec_routed(ctx, routing, CONTEXT_CHECK, timeout, false)?;
    let schema = ctx.rp.tools_schema(None, timeout)?;

    Ok(vec![
        Check {
            name: "tabs",
            result: tabs,
        },
        Check {
            name: "context",
            result: context,
        },
        Check {
            name: "tools-schema",
            result: schema,
        },
    ])
}

/// Run the checks and print `<name>: ok|fail` for each. Exit 1 if any failed.
pub fn smoke<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    request: &RoutingRequest,
    timeout: Option<u64>,
) -> Result<i32> {
    let routing = prepare_routing(ctx, request)?;
    report.set_routing(&routing);
    let timeout = ctx.timeout(timeout, TimeoutKey::Smoke);
    record_timeout(ctx, report, timeout);

    switch_workspace(ctx, &routing, timeout, report)?;

    let checks = run_checks(ctx, &routing, timeout)?;
    for check in &checks {
        println!("{}: {}", check.name, check.status());
        report.add_stage(&format!("smoke_{}", check.name), &check.result, false);
    }

    let failed: Vec<&str> = checks
        .iter()
        .filter(|c| !c.passed())
        .map(|c| c.name)
        .collect();
    if !failed.is_empty() {
        for check in checks.iter().filter(|c| !c.passed()) {
            eprintln!("\n--- {} output ---", check.name);
            emit_failure_hint(check.name, &check.result, false);
            print_output(&check.result);
        }
        report.insert("failed_checks", failed);
        return Ok(CHECK_FAILED_EXIT_CODE);
    }

    remember(ctx, &routing);
    Ok(0)
}
