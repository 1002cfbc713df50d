//! TOML-based configuration for reportkit.
//!
//! Supports a config file (reportkit.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [database]
//! path = "${REPORTKIT_DATA}/reports.db"
//!
//! [engine]
//! max_page_size = 1000
//! default_page_size = 50
//! record_history = true
//!
//! [raw_query]
//! enabled = true
//! admin_only = true
//!
//! [auth]
//! admins = ["u-admin"]
//!
//! [logging]
//! filter = "reportkit=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::{AssembleOptions, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub engine: EngineSettings,
    pub raw_query: RawQuerySettings,
    pub auth: AuthSettings,
    pub logging: LoggingSettings,
}

/// Catalog/storage database used by the CLI.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file path (supports ${ENV_VAR} expansion).
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "reportkit.db".to_string(),
        }
    }
}

impl DatabaseSettings {
    /// Get the database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<PathBuf, SettingsError> {
        expand_env_vars(&self.path).map(PathBuf::from)
    }
}

/// Report execution limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Page size cap. Can only lower the hard cap of 5000.
    pub max_page_size: u64,

    /// Page size when neither the request nor the template sets one.
    pub default_page_size: u64,

    /// Append an execution record for every run.
    pub record_history: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_page_size: MAX_PAGE_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
            record_history: true,
        }
    }
}

impl EngineSettings {
    /// Assembly limits derived from these settings.
    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            max_page_size: self.max_page_size.min(MAX_PAGE_SIZE),
            default_page_size: self.default_page_size,
        }
    }
}

/// Raw-query visualization sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RawQuerySettings {
    /// Allow raw-query sources at all.
    pub enabled: bool,

    /// Only run raw queries on components owned by an administrator.
    pub admin_only: bool,
}

impl Default for RawQuerySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_only: true,
        }
    }
}

/// Authorization settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthSettings {
    /// User ids treated as administrators.
    pub admins: Vec<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default tracing filter when RUST_LOG is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and check settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `REPORTKIT_CONFIG`
    /// 2. `./reportkit.toml`
    /// 3. `~/.config/reportkit/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("REPORTKIT_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("reportkit.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("reportkit").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    fn check(&self) -> Result<(), SettingsError> {
        if self.engine.max_page_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "engine.max_page_size must be at least 1".into(),
            ));
        }
        if self.engine.default_page_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "engine.default_page_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
