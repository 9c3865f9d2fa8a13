//! Configuration for rpflow.
//!
//! ## config.kdl - User preferences
//!
//! Located at `$RPFLOW_CONFIG_DIR/config.kdl`, else `~/.config/rpflow/config.kdl`.
//!
//! Contains:
//! - `binary` - Name or path of the rp-cli binary
//! - `default-tab` - Tab used when none is given or remembered
//! - `default-workspace` - Workspace used when none is given or remembered
//! - `profile` - "fast", "normal" or "deep"
//! - `retry-timeout-scale` - Multiplier for the builder retry timeout
//!
//! The remembered routing lives next to it in `state.json` (see
//! [`crate::state`]).
//!
//! ## Precedence
//!
//! CLI flag > config.kdl > defaults. Use the [`resolver`] module for
//! resolution with source tracking.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, DEFAULT_RETRY_TIMEOUT_SCALE, DEFAULT_TAB, DEFAULT_WORKSPACE, Resolved,
    Settings, ValueSource, config_path, effective_timeout, expand_home, load_config,
    retry_timeout,
};
pub use schema::{Profile, RpflowConfig, TimeoutKey};
