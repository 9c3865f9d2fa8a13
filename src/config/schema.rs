//! KDL schema for config.kdl and the timeout profiles.
//!
//! ```kdl
//! // rpflow preferences
//! binary "rp-cli"
//! default-tab "T1"
//! default-workspace "GitHub"
//! profile "normal"          // fast | normal | deep
//! retry-timeout-scale 1.5
//! ```

use crate::{Error, Result};
use kdl::{KdlDocument, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Timeout/reliability profile.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Short deadlines for quick interactive use
    Fast,
    #[default]
    Normal,
    /// Long deadlines for large selections and slow builders
    Deep,
}

/// Operations with a per-profile default timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKey {
    Doctor,
    Exec,
    Call,
    ToolsSchema,
    Export,
    PlanExport,
    Autopilot,
    Preflight,
    Smoke,
}

impl Profile {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Some(Profile::Fast),
            "normal" => Some(Profile::Normal),
            "deep" => Some(Profile::Deep),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Fast => "fast",
            Profile::Normal => "normal",
            Profile::Deep => "deep",
        }
    }

    /// Default timeout in seconds for `key` under this profile.
    pub fn timeout_secs(&self, key: TimeoutKey) -> u64 {
        use TimeoutKey::*;
        let (fast, normal, deep) = match key {
            Doctor => (20, 30, 45),
            Exec | Call => (45, 60, 90),
            ToolsSchema => (30, 60, 90),
            Export => (60, 90, 150),
            PlanExport | Autopilot => (90, 120, 240),
            Preflight | Smoke => (25, 45, 90),
        };
        match self {
            Profile::Fast => fast,
            Profile::Normal => normal,
            Profile::Deep => deep,
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preferences stored in config.kdl. Unset values fall back to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpflowConfig {
    /// Name or path of the rp-cli binary
    pub binary: Option<String>,
    pub default_tab: Option<String>,
    pub default_workspace: Option<String>,
    pub profile: Option<Profile>,
    /// Retry timeout multiplier used when no explicit retry timeout is given
    pub retry_timeout_scale: Option<f64>,
}

impl RpflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config.kdl text.
    ///
    /// Unknown nodes are ignored; known nodes with a wrong type or value are
    /// an error.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: KdlDocument = text
            .parse()
            .map_err(|e| Error::Config(format!("failed to parse KDL: {}", e)))?;
        Self::from_kdl(&doc)
    }

    /// Read config values from a KDL document.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self> {
        let mut config = Self::new();

        config.binary = string_value(doc, "binary")?;
        config.default_tab = string_value(doc, "default-tab")?;
        config.default_workspace = string_value(doc, "default-workspace")?;

        if let Some(profile) = string_value(doc, "profile")? {
            config.profile = Some(Profile::parse(&profile).ok_or_else(|| {
                Error::Config(format!(
                    "profile must be fast, normal or deep, got '{}'",
                    profile
                ))
            })?);
        }

        if let Some(value) = first_value(doc, "retry-timeout-scale") {
            let scale = match value {
                KdlValue::Float(f) => *f,
                KdlValue::Integer(i) => *i as f64,
                other => {
                    return Err(Error::Config(format!(
                        "retry-timeout-scale must be a number, got {}",
                        other
                    )));
                }
            };
            if !scale.is_finite() || scale <= 0.0 {
                return Err(Error::Config(format!(
                    "retry-timeout-scale must be positive, got {}",
                    scale
                )));
            }
            config.retry_timeout_scale = Some(scale);
        }

        Ok(config)
    }
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node: &KdlNode| node.entries().first())
        .map(|entry| entry.value())
}

fn string_value(doc: &KdlDocument, name: &str) -> Result<Option<String>> {
    match first_value(doc, name) {
        None => Ok(None),
        Some(value) => match value.as_string() {
            Some(s) if !s.is_empty() => Ok(Some(s.to_string())),
            Some(_) => Err(Error::Config(format!("{} must not be empty", name))),
            None => Err(Error::Config(format!(
                "{} must be a string, got {}",
                name, value
            ))),
        },
    }
}
