//! Window, tab and workspace routing.
//!
//! Every command that talks to a specific compose tab needs a window id, a
//! tab name and a workspace name. They are resolved fresh per invocation.
//!
//! ## Window precedence
//!
//! 1. `--window` (must be open)
//! 2. Remembered window from state.json, if still open
//! 3. The only open window
//!
//! ## Tab / workspace precedence
//!
//! 1. CLI flag
//! 2. Remembered value from state.json
//! 3. Configured default (config.kdl, then built-in)
//!
//! Tabs must exist in the resolved window; workspaces are not checked here
//! because the workspace switch reports its own failure.
//!
//! Strict mode disables every remembered fallback and requires all three
//! flags to be given.

use crate::config::{Resolved, ValueSource};
use crate::rpcli::{TabInfo, WindowInfo};
use crate::{Error, Result};
use serde::Serialize;

/// Routing flags as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingRequest {
    pub window: Option<i64>,
    pub tab: Option<String>,
    pub workspace: Option<String>,
    pub strict: bool,
}

/// The routing decision for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    pub window: Resolved<i64>,
    pub tab: Resolved<String>,
    pub workspace: Resolved<String>,
}

/// Routing as written to run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingRecord {
    pub window: i64,
    pub tab: String,
    pub workspace: String,
}

impl Routing {
    pub fn window(&self) -> i64 {
        self.window.value
    }

    pub fn tab(&self) -> &str {
        &self.tab.value
    }

    pub fn workspace(&self) -> &str {
        &self.workspace.value
    }

    /// The plain values for a run report.
    pub fn record(&self) -> RoutingRecord {
        RoutingRecord {
            window: self.window.value,
            tab: self.tab.value.clone(),
            workspace: self.workspace.value.clone(),
        }
    }
}

/// Fail unless every routing flag is explicit (strict mode only).
pub fn check_strict(request: &RoutingRequest) -> Result<()> {
    if !request.strict {
        return Ok(());
    }
    if request.window.is_none() {
        return Err(Error::StrictMissing("window"));
    }
    if request.tab.as_deref().is_none_or(str::is_empty) {
        return Err(Error::StrictMissing("tab"));
    }
    if request.workspace.as_deref().is_none_or(str::is_empty) {
        return Err(Error::StrictMissing("workspace"));
    }
    Ok(())
}

/// Pick the target window from the live list.
pub fn resolve_window(
    windows: &[WindowInfo],
    requested: Option<i64>,
    remembered: Option<i64>,
) -> Result<Resolved<i64>> {
    let ids: Vec<i64> = windows.iter().map(|w| w.id).collect();

    if let Some(requested) = requested {
        if !ids.contains(&requested) {
            return Err(Error::WindowNotFound {
                requested,
                available: ids,
            });
        }
        return Ok(Resolved::new(requested, ValueSource::CliFlag));
    }

    if let Some(remembered) = remembered {
        if ids.contains(&remembered) {
            return Ok(Resolved::new(remembered, ValueSource::Remembered));
        }
        tracing::debug!(remembered, ?ids, "remembered window is gone");
    }

    match ids.as_slice() {
        [only] => Ok(Resolved::new(*only, ValueSource::Live)),
        [] => Err(Error::NoWindows),
        _ => Err(Error::MultipleWindows(ids)),
    }
}

/// Pick a name: flag, then remembered, then the configured default.
///
/// Empty strings count as unset. `default` carries its own source so a
/// config.kdl default is reported as such.
pub fn resolve_name(
    requested: Option<&str>,
    remembered: Option<&str>,
    default: &Resolved<String>,
) -> Resolved<String> {
    if let Some(value) = requested.filter(|v| !v.is_empty()) {
        return Resolved::new(value.to_string(), ValueSource::CliFlag);
    }
    if let Some(value) = remembered.filter(|v| !v.is_empty()) {
        return Resolved::new(value.to_string(), ValueSource::Remembered);
    }
    default.clone()
}

/// Fail unless `tab` is one of the live tabs.
pub fn ensure_tab_exists(tabs: &[TabInfo], tab: &str) -> Result<()> {
    if tabs.iter().any(|t| t.name == tab) {
        return Ok(());
    }
    Err(Error::TabNotFound {
        tab: tab.to_string(),
        available: tabs.iter().map(|t| t.name.clone()).collect(),
    })
}
