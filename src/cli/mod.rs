//! CLI argument definitions for rpflow.

use crate::commands::BuilderOptions;
use crate::config::Profile;
use crate::routing::RoutingRequest;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// rpflow - Reliable Repo Prompt automation wrapper.
///
/// Every command resolves a window, tab and workspace (flags, then the last
/// successful run, then defaults), runs rp-cli with a deadline and exits with
/// a predictable code: 0 ok, 1 check failed, 2 rpflow error, 124 timeout.
#[derive(Parser, Debug)]
#[command(name = "rpflow")]
#[command(author, version, about = "Reliable Repo Prompt automation wrapper", long_about = None)]
pub struct Cli {
    /// Write a structured run report JSON to this path
    #[arg(long = "report-json", global = true, value_name = "PATH")]
    pub report_json: Option<PathBuf>,

    /// Timeout/reliability profile (default: normal, or config.kdl)
    #[arg(long, global = true, value_enum)]
    pub profile: Option<Profile>,

    /// rp-cli binary name or path (default: rp-cli, or config.kdl)
    #[arg(long = "rp-cli", global = true, env = "RPFLOW_RP_CLI", value_name = "BINARY")]
    pub rp_cli: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags selecting the target window, tab and workspace.
#[derive(Args, Debug, Clone, Default)]
pub struct RoutingArgs {
    /// Window id (must be open)
    #[arg(long)]
    pub window: Option<i64>,

    /// Compose tab name
    #[arg(long)]
    pub tab: Option<String>,

    /// Workspace to switch to
    #[arg(long)]
    pub workspace: Option<String>,

    /// Require explicit --window/--tab/--workspace and ignore remembered routing
    #[arg(long)]
    pub strict: bool,
}

impl RoutingArgs {
    pub fn request(&self) -> RoutingRequest {
        RoutingRequest {
            window: self.window,
            tab: self.tab.clone(),
            workspace: self.workspace.clone(),
            strict: self.strict,
        }
    }
}

/// Flags for the builder commands (plan-export, autopilot).
#[derive(Args, Debug, Clone)]
pub struct BuilderArgs {
    /// Comma-separated files and folders to select
    #[arg(long = "select-set")]
    pub select_set: String,

    /// Task description handed to the plan builder
    #[arg(long)]
    pub task: String,

    /// Path the prompt is exported to
    #[arg(long)]
    pub out: PathBuf,

    /// Builder timeout in seconds (default: from profile)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Export the plain selection when the builder times out or is SIGKILLed
    #[arg(long)]
    pub fallback_export_on_timeout: bool,

    /// Retry one builder run on timeout/SIGKILL
    #[arg(long)]
    pub retry_on_timeout: bool,

    /// Retry timeout seconds (defaults to scaled base timeout)
    #[arg(long)]
    pub retry_timeout: Option<u64>,

    /// Retry timeout multiplier when --retry-timeout is not set (default: 1.5)
    #[arg(long)]
    pub retry_timeout_scale: Option<f64>,

    /// Existing export to reuse if the builder and fallback fail
    #[arg(long, value_name = "PATH")]
    pub resume_from_export: Option<PathBuf>,
}

impl BuilderArgs {
    pub fn options(&self) -> BuilderOptions {
        BuilderOptions {
            select_set: self.select_set.clone(),
            task: self.task.clone(),
            out: self.out.clone(),
            timeout: self.timeout,
            retry_on_timeout: self.retry_on_timeout,
            retry_timeout: self.retry_timeout,
            retry_timeout_scale: self.retry_timeout_scale,
            fallback_export_on_timeout: self.fallback_export_on_timeout,
            resume_from_export: self.resume_from_export.clone(),
        }
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check rp-cli connectivity and routing
    Doctor {
        /// Window id to check
        #[arg(long)]
        window: Option<i64>,

        /// Timeout in seconds for the tool-schema probe (default: from profile)
        #[arg(long)]
        timeout: Option<u64>,

        /// Ignore the remembered window
        #[arg(long)]
        strict: bool,
    },

    /// Run an rp-cli exec command with safe routing
    Exec {
        /// Command passed to `rp-cli -e`
        #[arg(short = 'e', long)]
        command: String,

        /// Ask rp-cli for raw JSON output
        #[arg(long)]
        raw_json: bool,

        #[command(flatten)]
        routing: RoutingArgs,

        /// Timeout in seconds (default: from profile)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Invoke an rp-cli tool with safe routing
    Call {
        /// Tool name for -c
        #[arg(long)]
        tool: String,

        /// Argument for -j (inline JSON, @file, or @-)
        #[arg(long, default_value = "")]
        json_arg: String,

        #[command(flatten)]
        routing: RoutingArgs,

        /// Timeout in seconds (default: from profile)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the rp-cli tool schema
    ToolsSchema {
        /// Only this tool group
        #[arg(long)]
        group: Option<String>,

        /// Timeout in seconds (default: from profile)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Select files and export the prompt
    Export {
        /// Comma-separated files and folders to select
        #[arg(long = "select-set")]
        select_set: String,

        /// Path the prompt is exported to
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        routing: RoutingArgs,

        /// Timeout in seconds (default: from profile)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Run the plan builder and export the prompt, with retry/fallback/resume
    PlanExport {
        #[command(flatten)]
        builder: BuilderArgs,

        #[command(flatten)]
        routing: RoutingArgs,
    },

    /// Preflight checks followed by plan-export
    Autopilot {
        #[command(flatten)]
        builder: BuilderArgs,

        /// Timeout in seconds for each preflight check (default: from profile)
        #[arg(long)]
        preflight_timeout: Option<u64>,

        #[command(flatten)]
        routing: RoutingArgs,
    },

    /// Run quick end-to-end health checks
    Smoke {
        #[command(flatten)]
        routing: RoutingArgs,

        /// Timeout in seconds for each check (default: from profile)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

impl Commands {
    /// Command name as used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Doctor { .. } => "doctor",
            Commands::Exec { .. } => "exec",
            Commands::Call { .. } => "call",
            Commands::ToolsSchema { .. } => "tools-schema",
            Commands::Export { .. } => "export",
            Commands::PlanExport { .. } => "plan-export",
            Commands::Autopilot { .. } => "autopilot",
            Commands::Smoke { .. } => "smoke",
        }
    }
}
