//! rpflow - A reliability wrapper around `rp-cli` for scripted Repo Prompt automation.
//!
//! This library provides the core functionality for the `rpflow` CLI tool:
//! bounded subprocess execution, window/tab/workspace routing, remembered
//! routing state, structured run reports, and the retry/fallback/resume
//! policies of the builder commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod report;
pub mod routing;
pub mod rpcli;
pub mod state;

/// Exit code used when a stage exceeds its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code for rpflow's own errors (routing, environment, parse failures).
pub const ERROR_EXIT_CODE: i32 = 2;

/// Exit code for failing smoke or preflight checks.
pub const CHECK_FAILED_EXIT_CODE: i32 = 1;


/// Library-level error type for rpflow operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{binary} not found in PATH")]
    BinaryNotFound { binary: String },

    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Tool(String),

    #[error("failed to parse {what} json: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected {0} payload")]
    UnexpectedPayload(&'static str),

    #[error("requested window {requested} not found; available: {available:?}")]
    WindowNotFound { requested: i64, available: Vec<i64> },

    #[error("no Repo Prompt windows are open")]
    NoWindows,

    #[error("multiple windows detected ({0:?}); pass --window")]
    MultipleWindows(Vec<i64>),

    #[error("tab '{tab}' not found; available: {available:?}")]
    TabNotFound { tab: String, available: Vec<String> },

    #[error("strict mode requires --{0}")]
    StrictMissing(&'static str),

    #[error("{0}")]
    WorkspaceSwitch(String),

    #[error("invalid config: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from resolving the target window or tab.
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            Error::WindowNotFound { .. }
                | Error::NoWindows
                | Error::MultipleWindows(_)
                | Error::TabNotFound { .. }
                | Error::StrictMissing(_)
        )
    }
}

/// Result type alias for rpflow operations.
pub type Result<T> = std::result::Result<T, Error>;
