//! `rpflow doctor`: connectivity and routing probe.

use super::{Context, emit_failure_hint, print_output, record_timeout};
use crate::Result;
use crate::config::TimeoutKey;
use crate::report::RunReport;
use crate::routing::resolve_window;
use crate::rpcli::{LISTING_TIMEOUT, Runner};
use crate::state::RpState;
use serde_json::Value;

/// Report what rpflow can see. Informational only: always exits 0 once the
/// window listing succeeds.
pub fn doctor<R: Runner>(
    ctx: &Context<R>,
    report: &mut RunReport,
    window: Option<i64>,
    strict: bool,
    timeout: Option<u64>,
) -> Result<i32> {
    let timeout = ctx.timeout(timeout, TimeoutKey::Doctor);
    record_timeout(ctx, report, timeout);

    let windows = ctx.rp.list_windows(LISTING_TIMEOUT)?;
    println!("rpflow {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build: {} ({})",
        env!("RPFLOW_GIT_COMMIT"),
        env!("RPFLOW_BUILD_TIMESTAMP")
    );
    println!("binary: {}", ctx.rp.runner().binary_name());
    println!("windows: {}", windows.len());
    report.insert("windows_count", windows.len());

    let remembered = if strict {
        RpState::default()
    } else {
        ctx.store.load()
    };

    let selected = match resolve_window(&windows, window, remembered.last_window) {
        Ok(resolved) => {
            println!("selected_window: {}", resolved.value);
            Some(resolved.value)
        }
        Err(e) => {
            println!("window_resolution: {}", e);
            None
        }
    };
    report.insert("selected_window", selected);

    if let Some(w) = selected {
        match ctx.rp.list_tabs(Some(w), LISTING_TIMEOUT) {
            Ok(tabs) => {
                let names: Vec<&str> = tabs.iter().map(|t| t.name.as_str()).collect();
                println!("tabs_in_window_{}: {}", w, names.join(", "));
            }
            Err(e) => println!("tabs_in_window_{}: error: {}", w, e),
        }
    }

    let schema = ctx.rp.tools_schema(None, timeout)?;
    report.add_stage("tools-schema", &schema, false);
    if schema.is_success() {
        println!("tools_schema: ok");
        report.insert("tools_schema_ok", Value::Bool(true));
    } else {
        println!("tools_schema: failed");
        report.insert("tools_schema_ok", Value::Bool(false));
        emit_failure_hint("tools-schema", &schema, false);
        print_output(&schema);
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpcli::RunResult;
    use crate::test_utils::{ScriptedRunner, TestEnv};
    use std::time::Duration;

    #[test]
    fn test_doctor_reports_selected_window() {
        let env = TestEnv::new();
        let ctx = env.context(ScriptedRunner::with_live_routing(|_| RunResult::ok("{}")));
        let mut report = RunReport::start("doctor");

        let code = doctor(&ctx, &mut report, None, false, None).unwrap();

        assert_eq!(code, 0);
        assert_eq!(report.get("windows_count"), Some(&1.into()));
        assert_eq!(report.get("selected_window"), Some(&1.into()));
        assert_eq!(report.get("tools_schema_ok"), Some(&true.into()));
        assert_eq!(report.stages()[0].name, "tools-schema");
    }

    #[test]
    fn test_doctor_survives_resolution_failure() {
        let env = TestEnv::new();
        let ctx = env.context(ScriptedRunner::new(|inv| match inv.exec_command() {
            Some("windows") => RunResult::ok(r#"[{"windowID": 1}, {"windowID": 2}]"#),
            _ => RunResult::failed(1, "schema down"),
        }));
        let mut report = RunReport::start("doctor");

        let code = doctor(&ctx, &mut report, None, false, None).unwrap();

        assert_eq!(code, 0);
        assert_eq!(report.get("selected_window"), Some(&Value::Null));
        assert_eq!(report.get("tools_schema_ok"), Some(&false.into()));
        // No tab listing without a selected window.
        assert_eq!(ctx.rp.runner().calls().len(), 2);
    }

    #[test]
    fn test_doctor_tab_listing_failure_is_not_fatal() {
        let env = TestEnv::new();
        let ctx = env.context(ScriptedRunner::new(|inv| match inv.exec_command() {
            Some("windows") => RunResult::ok(r#"[{"windowID": 4}]"#),
            Some("tabs") => RunResult::failed(1, "tabs unavailable"),
            _ => RunResult::ok("{}"),
        }));
        let mut report = RunReport::start("doctor");

        assert_eq!(doctor(&ctx, &mut report, None, false, None).unwrap(), 0);
    }

    #[test]
    fn test_doctor_window_listing_failure_is_fatal() {
        let env = TestEnv::new();
        let ctx = env.context(ScriptedRunner::new(|_| {
            RunResult::failed(1, "Repo Prompt is not running")
        }));
        let mut report = RunReport::start("doctor");

        let err = doctor(&ctx, &mut report, None, false, None).unwrap_err();
        assert_eq!(err.to_string(), "Repo Prompt is not running");
    }

    #[test]
    fn test_doctor_strict_ignores_remembered_window() {
        let env = TestEnv::new();
        env.store()
            .save(&RpState {
                last_window: Some(2),
                ..Default::default()
            })
            .unwrap();
        let runner = || {
            ScriptedRunner::new(|inv| match inv.exec_command() {
                Some("windows") => RunResult::ok(r#"[{"windowID": 1}, {"windowID": 2}]"#),
                Some("tabs") => RunResult::ok(r#"{"tabs": []}"#),
                _ => RunResult::ok("{}"),
            })
        };

        let ctx = env.context(runner());
        let mut report = RunReport::start("doctor");
        doctor(&ctx, &mut report, None, false, None).unwrap();
        assert_eq!(report.get("selected_window"), Some(&2.into()));

        let ctx = env.context(runner());
        let mut report = RunReport::start("doctor");
        doctor(&ctx, &mut report, None, true, None).unwrap();
        assert_eq!(report.get("selected_window"), Some(&Value::Null));
    }

    #[test]
    fn test_doctor_schema_timeout() {
        let env = TestEnv::new();
        let ctx = env.context(ScriptedRunner::with_live_routing(|_| RunResult::ok("{}")));
        let mut report = RunReport::start("doctor");

        doctor(&ctx, &mut report, None, false, Some(3)).unwrap();

        let calls = ctx.rp.runner().calls();
        let schema = calls.iter().find(|c| c.is_tools_schema()).unwrap();
        assert_eq!(schema.timeout, Duration::from_secs(3));
    }
}
