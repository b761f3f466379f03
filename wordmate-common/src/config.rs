//! Bootstrap configuration
//!
//! Settings are resolved once at startup in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The resolved [`ServiceConfig`] is passed explicitly to the components that
//! need it; nothing here is global.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const ENV_CONFIG: &str = "WORDMATE_CONFIG";
/// Environment variable naming the SQLite database file
pub const ENV_DATABASE: &str = "WORDMATE_DATABASE";
/// Environment variable for the HTTP port
pub const ENV_PORT: &str = "WORDMATE_PORT";

/// Configuration as read from the TOML file
///
/// Every field is optional in the file; missing fields take built-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to SQLite database file
    pub database_path: Option<PathBuf>,

    /// HTTP bind address
    pub host: String,

    /// HTTP server port
    pub port: u16,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Progress engine tuning
    pub progress: ProgressSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            host: "127.0.0.1".to_string(),
            port: 8000,
            logging: LoggingConfig::default(),
            progress: ProgressSettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Tuning for the review selector and trial importer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Words at or above this mastery level are never due for review
    pub review_mastery_threshold: f64,

    /// Number of trial sessions kept on import (the most recent by input order)
    pub trial_session_cap: usize,

    /// Due-word limit used when the caller does not pass one
    pub default_review_limit: u32,

    /// Upper bound on a caller-supplied due-word limit
    pub max_review_limit: u32,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            review_mastery_threshold: 4.0,
            trial_session_cap: 5,
            default_review_limit: 20,
            max_review_limit: 200,
        }
    }
}

impl ProgressSettings {
    /// Reject settings that would break the engine's invariants
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=5.0).contains(&self.review_mastery_threshold) {
            return Err(Error::Config(format!(
                "review_mastery_threshold must be within [0.0, 5.0], got {}",
                self.review_mastery_threshold
            )));
        }
        if self.default_review_limit == 0 || self.max_review_limit == 0 {
            return Err(Error::Config("review limits must be positive".to_string()));
        }
        if self.default_review_limit > self.max_review_limit {
            return Err(Error::Config(format!(
                "default_review_limit ({}) exceeds max_review_limit ({})",
                self.default_review_limit, self.max_review_limit
            )));
        }
        Ok(())
    }

    /// Requested due-word limit capped at `max_review_limit`; zero stays zero
    pub fn effective_review_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_review_limit)
            .min(self.max_review_limit)
    }
}

/// Command-line values that take precedence over everything else
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub logging: LoggingConfig,
    pub progress: ProgressSettings,
}

impl ServiceConfig {
    /// Resolve configuration from overrides, environment, TOML and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));

        let toml_config = match config_path {
            Some(path) => load_toml_config(&path)?,
            None => match default_config_path() {
                Some(path) => load_toml_config(&path)?,
                None => TomlConfig::default(),
            },
        };

        let database_path = overrides
            .database_path
            .clone()
            .or_else(|| std::env::var(ENV_DATABASE).ok().map(PathBuf::from))
            .or(toml_config.database_path)
            .unwrap_or_else(default_database_path);

        let env_port = match std::env::var(ENV_PORT) {
            Ok(value) => Some(value.parse::<u16>().map_err(|e| {
                Error::Config(format!("{} is not a valid port ({}): {}", ENV_PORT, value, e))
            })?),
            Err(_) => None,
        };
        let port = overrides.port.or(env_port).unwrap_or(toml_config.port);

        let host = overrides.host.clone().unwrap_or(toml_config.host);

        let mut logging = toml_config.logging;
        if let Some(level) = &overrides.log_level {
            logging.level = level.clone();
        }

        toml_config.progress.validate()?;

        Ok(Self {
            database_path,
            host,
            port,
            logging,
            progress: toml_config.progress,
        })
    }

    /// `host:port` string suitable for binding a listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load a TOML config file
///
/// A missing file is not an error: a warning is logged and defaults are
/// used. A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default config file location: `<config_dir>/wordmate/config.toml`
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wordmate").join("config.toml"))
}

/// Default database location: `<data_local_dir>/wordmate/wordmate.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wordmate"))
        .unwrap_or_else(|| PathBuf::from("./wordmate_data"))
        .join("wordmate.db")
}
