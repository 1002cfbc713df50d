//! Configuration module for reportkit.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, AuthSettings, DatabaseSettings, EngineSettings, LoggingSettings,
    RawQuerySettings, Settings, SettingsError,
};
