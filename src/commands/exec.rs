//! Single-stage passthrough commands: exec, call, tools-schema and export.

use super::{
    Context, exec_routed, prepare_routing, print_output, record_out_file, record_stage,
    record_timeout, remember, remove_existing, switch_workspace,
};
use crate::Result;
use crate::config::TimeoutKey;
use crate::report::RunReport;
use crate::routing::RoutingRequest;
use crate::rpcli::{RpCommand, Runner, split_paths};
use std::path::Path;

/// Run an `rp-cli -e` command in the routed tab and return its exit code.
pub fn exec<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    request: &RoutingRequest,
    command: &str,
    raw_json: bool,
    timeout: Option<u64>,
) -> Result<i32> {
    let routing = prepare_routing(ctx, request)?;
    report.set_routing(&routing);
    let timeout = ctx.timeout(timeout, TimeoutKey::Exec);
    record_timeout(ctx, report, timeout);
    report.insert("command_text", command);

    switch_workspace(ctx, &routing, timeout, report)?;

    let res = exec_routed(ctx, &routing, command, timeout, raw_json)?;
    record_stage(report, "exec", &res, command.contains("builder "));
    print_output(&res);

    if res.is_success() {
        remember(ctx, &routing);
    }
    Ok(res.code)
}

/// Invoke an rp-cli tool in the routed tab and return its exit code.
pub fn call<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    request: &RoutingRequest,
    tool: &str,
    json_arg: &str,
    timeout: Option<u64>,
) -> Result<i32> {
    let routing = prepare_routing(ctx, request)?;
    report.set_routing(&routing);
    let timeout = ctx.timeout(timeout, TimeoutKey::Call);
    record_timeout(ctx, report, timeout);
    report.insert("tool", tool);

    switch_workspace(ctx, &routing, timeout, report)?;

    let res = ctx.rp.call(
        tool,
        json_arg,
        Some(routing.window()),
        Some(routing.tab()),
        timeout,
    )?;
    record_stage(report, "call", &res, false);
    print_output(&res);

    if res.is_success() {
        remember(ctx, &routing);
    }
    Ok(res.code)
}

/// Print the tool schema. No routing is involved.
pub fn tools_schema<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    group: Option<&str>,
    timeout: Option<u64>,
) -> Result<i32> {
    let timeout = ctx.timeout(timeout, TimeoutKey::ToolsSchema);
    record_timeout(ctx, report, timeout);
    report.insert("group", group.unwrap_or_default());

    let res = ctx.rp.tools_schema(group, timeout)?;
    record_stage(report, "tools-schema", &res, false);
    print_output(&res);
    Ok(res.code)
}

/// Select `select_set` and export the prompt to `out`.
pub fn export<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    request: &RoutingRequest,
    select_set: &str,
    out: &Path,
    timeout: Option<u64>,
) -> Result<i32> {
    let routing = prepare_routing(ctx, request)?;
    report.set_routing(&routing);
    let timeout = ctx.timeout(timeout, TimeoutKey::Export);
    record_timeout(ctx, report, timeout);

    switch_workspace(ctx, &routing, timeout, report)?;
    remove_existing(out)?;

    let command =
        RpCommand::selection_export(&split_paths(select_set), &out.to_string_lossy()).build();
    let res = exec_routed(ctx, &routing, &command, timeout, false)?;
    record_stage(report, "export", &res, false);
    print_output(&res);
    record_out_file(report, out);

    if res.is_success() {
        remember(ctx, &routing);
    }
    Ok(res.code)
}
