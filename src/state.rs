//! Remembered routing state.
//!
//! The last window, tab and workspace that led to a successful run are kept
//! in `~/.config/rpflow/state.json` (or `$RPFLOW_CONFIG_DIR/state.json`) so the
//! next invocation can omit them. The file is replaced wholesale on every
//! save and only ever written after a successful command.

use crate::routing::Routing;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Environment variable overriding the rpflow config directory.
pub const CONFIG_DIR_ENV: &str = "RPFLOW_CONFIG_DIR";

const STATE_FILE: &str = "state.json";

/// Persisted routing preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpState {
    #[serde(default)]
    pub last_window: Option<i64>,
    #[serde(default)]
    pub last_tab: Option<String>,
    #[serde(default)]
    pub last_workspace: Option<String>,
    /// RFC 3339 local time of the last save
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RpState {
    /// State remembering the given routing.
    pub fn from_routing(routing: &Routing) -> Self {
        Self {
            last_window: Some(routing.window()),
            last_tab: Some(routing.tab().to_string()),
            last_workspace: Some(routing.workspace().to_string()),
            updated_at: None,
        }
    }
}

/// The rpflow config directory: `$RPFLOW_CONFIG_DIR`, else `~/.config/rpflow`.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("could not determine home directory".to_string()))?;
    Ok(home.join(".config").join("rpflow"))
}

/// Reads and writes the state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store at the default location.
    pub fn default_location() -> Result<Self> {
        Ok(Self::at(config_dir()?.join(STATE_FILE)))
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, falling back to an empty state.
    ///
    /// A missing file is normal. An unreadable or malformed file is logged and
    /// ignored so a bad state file never blocks a run.
    pub fn load(&self) -> RpState {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return RpState::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable state file");
                return RpState::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring malformed state file");
                RpState::default()
            }
        }
    }

    /// Replace the state file, stamping `updated_at`.
    ///
    /// Written to a temp file in the same directory and renamed into place.
    pub fn save(&self, state: &RpState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let stamped = RpState {
            updated_at: Some(chrono::Local::now().to_rfc3339()),
            ..state.clone()
        };
        let json = serde_json::to_string_pretty(&stamped)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(path = %self.path.display(), "saved state");
        Ok(())
    }

    /// Remember a routing decision.
    pub fn remember(&self, routing: &Routing) -> Result<()> {
        self.save(&RpState::from_routing(routing))
    }
}
