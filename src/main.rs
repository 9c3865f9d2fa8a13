//! rpflow CLI - reliable Repo Prompt automation on top of rp-cli.

use clap::Parser;
use rpflow::cli::{Cli, Commands};
use rpflow::commands::{self, Context};
use rpflow::config::{ConfigOverrides, Settings};
use rpflow::report::{RunReport, write_report};
use rpflow::rpcli::{ProcessRunner, RpCli};
use rpflow::state::StateStore;
use rpflow::{ERROR_EXIT_CODE, Error};
use std::io::{self, Write};
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (EnvFilter syntax).
const LOG_ENV: &str = "RPFLOW_LOG";

fn main() {
    let cli = Cli::parse();
    init_logging();

    let Cli {
        report_json,
        profile,
        rp_cli,
        command,
    } = cli;

    let mut overrides = ConfigOverrides::new();
    if let Some(binary) = rp_cli {
        overrides = overrides.with_binary(binary);
    }
    if let Some(profile) = profile {
        overrides = overrides.with_profile(profile);
    }

    let mut report = RunReport::start(command.name());
    let result = build_context(&overrides).and_then(|ctx| run_command(&ctx, &mut report, command));

    let code = match result {
        Ok(code) => {
            if let Some(path) = &report_json {
                save_report(path, &report, None, code);
            }
            code
        }
        Err(e) => {
            eprintln!("rpflow error: {}", e);
            if e.is_routing() {
                eprintln!("rpflow hint: run `rpflow doctor` to see open windows and tabs");
            }
            if let Some(path) = &report_json {
                save_report(path, &report, Some(&e), ERROR_EXIT_CODE);
            }
            ERROR_EXIT_CODE
        }
    };

    let _ = io::stdout().flush();
    process::exit(code);
}

/// Install the stderr log subscriber. Defaults to warnings only so rp-cli
/// passthrough output stays clean.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolve settings, locate rp-cli and open the state store.
fn build_context(overrides: &ConfigOverrides) -> Result<Context<ProcessRunner>, Error> {
    let settings = Settings::load(overrides)?;
    tracing::debug!(
        binary = %settings.binary.value,
        binary_source = %settings.binary.source,
        profile = %settings.profile.value,
        profile_source = %settings.profile.source,
        "resolved settings"
    );
    let runner = ProcessRunner::locate(&settings.binary.value)?;
    let store = StateStore::default_location()?;
    Ok(Context::new(RpCli::new(runner), store, settings))
}

fn run_command(
    ctx: &Context<ProcessRunner>,
    report: &mut RunReport,
    command: Commands,
) -> Result<i32, Error> {
    match command {
        Commands::Doctor {
            window,
            timeout,
            strict,
        } => commands::doctor(ctx, report, window, strict, timeout),
        Commands::Exec {
            command,
            raw_json,
            routing,
            timeout,
        } => commands::exec(ctx, report, &routing.request(), &command, raw_json, timeout),
        Commands::Call {
            tool,
            json_arg,
            routing,
            timeout,
        } => commands::call(ctx, report, &routing.request(), &tool, &json_arg, timeout),
        Commands::ToolsSchema { group, timeout } => {
            commands::tools_schema(ctx, report, group.as_deref(), timeout)
        }
        Commands::Export {
            select_set,
            out,
            routing,
            timeout,
        } => commands::export(ctx, report, &routing.request(), &select_set, &out, timeout),
        Commands::PlanExport { builder, routing } => {
            commands::plan_export(ctx, report, &routing.request(), &builder.options())
        }
        Commands::Autopilot {
            builder,
            preflight_timeout,
            routing,
        } => commands::autopilot(
            ctx,
            report,
            &routing.request(),
            &builder.options(),
            preflight_timeout,
        ),
        Commands::Smoke { routing, timeout } => {
            commands::smoke(ctx, report, &routing.request(), timeout)
        }
    }
}

/// Write the run report. A report that cannot be written is reported but
/// does not change the exit code.
fn save_report(path: &Path, report: &RunReport, error: Option<&Error>, code: i32) {
    let doc = match error {
        Some(e) => report.finish_with_error(e),
        None => report.finish(code),
    };
    tracing::debug!(command = report.command(), exit_code = doc.exit_code, "writing run report");
    if let Err(e) = write_report(path, &doc) {
        tracing::warn!(path = %path.display(), "could not write run report: {}", e);
        eprintln!("rpflow error: failed to write report {}: {}", path.display(), e);
    }
}
