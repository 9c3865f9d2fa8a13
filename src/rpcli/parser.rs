//! Parsers for `rp-cli --raw-json` listings.

use crate::{Error, Result};
use serde_json::Value;

/// A Repo Prompt window as reported by `-e windows`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: i64,
}

/// A compose tab as reported by `-e tabs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub name: String,
}

/// Parse the `-e windows` payload: a JSON array of objects with a `windowID`.
///
/// Entries without a usable `windowID` are skipped.
pub fn parse_windows(payload: &str) -> Result<Vec<WindowInfo>> {
    let value: Value = serde_json::from_str(payload).map_err(|source| Error::Parse {
        what: "windows",
        source,
    })?;

    let entries = value
        .as_array()
        .ok_or(Error::UnexpectedPayload("windows"))?;

    Ok(entries
        .iter()
        .filter_map(|w| w.get("windowID").and_then(window_id))
        .map(|id| WindowInfo { id })
        .collect())
}

/// Parse the `-e tabs` payload: an object with a `tabs` array of `{name, ...}`.
///
/// Entries without a non-empty `name` are skipped.
pub fn parse_tabs(payload: &str) -> Result<Vec<TabInfo>> {
    let value: Value = serde_json::from_str(payload).map_err(|source| Error::Parse {
        what: "tabs",
        source,
    })?;

    let entries = value
        .get("tabs")
        .and_then(Value::as_array)
        .ok_or(Error::UnexpectedPayload("tabs"))?;

    Ok(entries
        .iter()
        .filter_map(|t| t.get("name"))
        .filter_map(|name| match name {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .map(|name| TabInfo { name })
        .collect())
}

fn window_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
