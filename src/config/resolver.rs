//! Precedence resolution for settings and timeouts.
//!
//! ## Settings precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. config.kdl (`$RPFLOW_CONFIG_DIR/config.kdl` or `~/.config/rpflow/config.kdl`)
//! 3. Built-in defaults
//!
//! Timeouts follow the same idea: an explicit `--timeout` above zero wins,
//! otherwise the resolved profile's table applies.

use super::schema::{Profile, RpflowConfig, TimeoutKey};
use crate::rpcli::DEFAULT_BINARY;
use crate::state::config_dir;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tab used when none is given or remembered.
pub const DEFAULT_TAB: &str = "T1";

/// Workspace used when none is given or remembered.
pub const DEFAULT_WORKSPACE: &str = "GitHub";

/// Retry timeout multiplier when neither flag nor config sets one.
pub const DEFAULT_RETRY_TIMEOUT_SCALE: f64 = 1.5;

const CONFIG_FILE: &str = "config.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value remembered from the last successful run
    Remembered,
    /// Value from config.kdl
    Config,
    /// Built-in default value
    Default,
    /// The only window currently open
    Live,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Remembered => write!(f, "remembered"),
            ValueSource::Config => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
            ValueSource::Live => write!(f, "live"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for settings resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub binary: Option<String>,
    pub profile: Option<Profile>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Fully resolved settings with source tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub binary: Resolved<String>,
    pub default_tab: Resolved<String>,
    pub default_workspace: Resolved<String>,
    pub profile: Resolved<Profile>,
    pub retry_timeout_scale: Resolved<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary: Resolved::new(DEFAULT_BINARY.to_string(), ValueSource::Default),
            default_tab: Resolved::new(DEFAULT_TAB.to_string(), ValueSource::Default),
            default_workspace: Resolved::new(DEFAULT_WORKSPACE.to_string(), ValueSource::Default),
            profile: Resolved::new(Profile::default(), ValueSource::Default),
            retry_timeout_scale: Resolved::new(DEFAULT_RETRY_TIMEOUT_SCALE, ValueSource::Default),
        }
    }
}

impl Settings {
    /// Resolve settings from CLI overrides and a loaded config file.
    pub fn resolve(overrides: &ConfigOverrides, config: &RpflowConfig) -> Self {
        let mut result = Self::default();

        if let Some(ref binary) = overrides.binary {
            result.binary = Resolved::new(binary.clone(), ValueSource::CliFlag);
        } else if let Some(ref binary) = config.binary {
            result.binary = Resolved::new(binary.clone(), ValueSource::Config);
        }

        if let Some(ref tab) = config.default_tab {
            result.default_tab = Resolved::new(tab.clone(), ValueSource::Config);
        }

        if let Some(ref workspace) = config.default_workspace {
            result.default_workspace = Resolved::new(workspace.clone(), ValueSource::Config);
        }

        if let Some(profile) = overrides.profile {
            result.profile = Resolved::new(profile, ValueSource::CliFlag);
        } else if let Some(profile) = config.profile {
            result.profile = Resolved::new(profile, ValueSource::Config);
        }

        if let Some(scale) = config.retry_timeout_scale {
            result.retry_timeout_scale = Resolved::new(scale, ValueSource::Config);
        }

        result
    }

    /// Resolve against the config.kdl in the rpflow config directory.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let config = load_config(&config_path()?)?;
        Ok(Self::resolve(overrides, &config))
    }

    pub fn profile(&self) -> Profile {
        self.profile.value
    }

    /// Timeout for `key`: explicit seconds above zero win, else the profile's.
    pub fn timeout(&self, explicit: Option<u64>, key: TimeoutKey) -> Duration {
        effective_timeout(explicit, self.profile(), key)
    }

    /// Retry scale: explicit flag above zero wins, else the resolved setting.
    pub fn retry_scale(&self, explicit: Option<f64>) -> f64 {
        explicit
            .filter(|s| *s > 0.0)
            .unwrap_or(self.retry_timeout_scale.value)
    }
}

/// Load config.kdl, treating a missing file as empty.
pub fn load_config(path: &Path) -> Result<RpflowConfig> {
    match fs::read_to_string(path) {
        Ok(text) => {
            tracing::debug!(path = %path.display(), "loading config");
            RpflowConfig::parse(&text)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RpflowConfig::default()),
        Err(e) => Err(Error::Config(format!("{}: {}", path.display(), e))),
    }
}

/// Path of config.kdl in the rpflow config directory.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Explicit seconds above zero win, otherwise the profile table.
pub fn effective_timeout(explicit: Option<u64>, profile: Profile, key: TimeoutKey) -> Duration {
    match explicit {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => Duration::from_secs(profile.timeout_secs(key)),
    }
}

/// Timeout for the single builder retry.
///
/// Explicit seconds above zero win; otherwise the base scaled by `scale`
/// (never below 1.0), and always at least one second longer than the base.
pub fn retry_timeout(explicit: Option<u64>, scale: f64, base: Duration) -> Duration {
    if let Some(secs) = explicit.filter(|s| *s > 0) {
        return Duration::from_secs(secs);
    }
    let base = base.as_secs();
    let scaled = (base as f64 * scale.max(1.0)).floor() as u64;
    Duration::from_secs(scaled.max(base + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== ValueSource Tests ====================

    #[test]
    fn test_value_source_display() {
        assert_eq!(format!("{}", ValueSource::CliFlag), "cli");
        assert_eq!(format!("{}", ValueSource::Remembered), "remembered");
        assert_eq!(format!("{}", ValueSource::Config), "config");
        assert_eq!(format!("{}", ValueSource::Default), "default");
        assert_eq!(format!("{}", ValueSource::Live), "live");
    }

    // ==================== Settings Resolution Tests ====================

    #[test]
    fn test_resolve_defaults() {
        let settings = Settings::resolve(&ConfigOverrides::new(), &RpflowConfig::default());

        assert_eq!(settings.binary.value, "rp-cli");
        assert_eq!(settings.default_tab.value, "T1");
        assert_eq!(settings.default_workspace.value, "GitHub");
        assert_eq!(settings.profile(), Profile::Normal);
        assert_eq!(settings.retry_timeout_scale.value, 1.5);
        assert_eq!(settings.profile.source, ValueSource::Default);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_resolve_from_config() {
        let config = RpflowConfig {
            binary: Some("/usr/local/bin/rp-cli".to_string()),
            default_tab: Some("T4".to_string()),
            default_workspace: Some("Work".to_string()),
            profile: Some(Profile::Fast),
            retry_timeout_scale: Some(2.0),
        };
        let settings = Settings::resolve(&ConfigOverrides::new(), &config);

        assert_eq!(settings.binary.source, ValueSource::Config);
        assert_eq!(settings.default_tab.value, "T4");
        assert_eq!(settings.default_workspace.source, ValueSource::Config);
        assert_eq!(settings.profile(), Profile::Fast);
        assert_eq!(settings.retry_timeout_scale.value, 2.0);
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = RpflowConfig {
            binary: Some("from-config".to_string()),
            profile: Some(Profile::Fast),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new()
            .with_binary("from-cli")
            .with_profile(Profile::Deep);
        let settings = Settings::resolve(&overrides, &config);

        assert_eq!(
            settings.binary,
            Resolved::new("from-cli".to_string(), ValueSource::CliFlag)
        );
        assert_eq!(
            settings.profile,
            Resolved::new(Profile::Deep, ValueSource::CliFlag)
        );
    }

    #[test]
    fn test_retry_scale_flag_wins() {
        let settings = Settings::default();
        assert_eq!(settings.retry_scale(Some(3.0)), 3.0);
        assert_eq!(settings.retry_scale(Some(0.0)), 1.5);
        assert_eq!(settings.retry_scale(None), 1.5);
    }

    // ==================== Config File Tests ====================

    #[test]
    fn test_load_config_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("config.kdl")).unwrap();
        assert_eq!(config, RpflowConfig::default());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.kdl");
        fs::write(&path, "profile \"deep\"\n").unwrap();
        assert_eq!(load_config(&path).unwrap().profile, Some(Profile::Deep));
    }

    #[test]
    fn test_load_config_malformed_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.kdl");
        fs::write(&path, "profile {").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }

    // ==================== Timeout Tests ====================

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home(Path::new("~/r.json")), home.join("r.json"));
        assert_eq!(expand_home(Path::new("/tmp/r.json")), PathBuf::from("/tmp/r.json"));
        assert_eq!(expand_home(Path::new("rel/~x")), PathBuf::from("rel/~x"));
    }

    #[test]
    fn test_effective_timeout() {
        assert_eq!(
            effective_timeout(Some(7), Profile::Deep, TimeoutKey::PlanExport),
            Duration::from_secs(7)
        );
        assert_eq!(
            effective_timeout(Some(0), Profile::Deep, TimeoutKey::PlanExport),
            Duration::from_secs(240)
        );
        assert_eq!(
            effective_timeout(None, Profile::Fast, TimeoutKey::Smoke),
            Duration::from_secs(25)
        );
    }

    #[test]
    fn test_retry_timeout_scaled() {
        let base = Duration::from_secs(120);
        assert_eq!(retry_timeout(None, 1.5, base), Duration::from_secs(180));
        assert_eq!(retry_timeout(Some(0), 2.0, base), Duration::from_secs(240));
    }

    #[test]
    fn test_retry_timeout_explicit() {
        assert_eq!(
            retry_timeout(Some(10), 1.5, Duration::from_secs(120)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_retry_timeout_always_longer_than_base() {
        assert_eq!(
            retry_timeout(None, 1.0, Duration::from_secs(60)),
            Duration::from_secs(61)
        );
        assert_eq!(
            retry_timeout(None, 0.2, Duration::from_secs(60)),
            Duration::from_secs(61)
        );
        assert_eq!(
            retry_timeout(None, 1.5, Duration::from_secs(1)),
            Duration::from_secs(2)
        );
    }
}
