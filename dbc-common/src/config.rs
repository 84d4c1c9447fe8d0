//! Configuration loading and config file resolution
//!
//! Resolution priority (highest first):
//! 1. Command-line argument (applied by the binary on top of the loaded file)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing config file is not fatal: the service logs a warning and starts
//! with compiled defaults. A config file that exists but cannot be parsed is.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8073;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "DBC_CONFIG";

/// Scheduled job settings (`[jobs]` table)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobsConfig {
    /// Master switch for the background scheduler
    pub enabled: bool,
    /// UTC hour of the daily settlement sweep
    pub settlement_hour: u32,
    /// UTC minute of the daily settlement sweep
    pub settlement_minute: u32,
    /// Run the sweep once before the schedule starts
    pub run_on_startup: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settlement_hour: 23,
            settlement_minute: 0,
            run_on_startup: true,
        }
    }
}

/// Service configuration as read from `config.toml`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Per-request timeout applied by the HTTP layer
    pub request_timeout_secs: u64,
    /// Scheduler settings
    pub jobs: JobsConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from("./dbc.db"),
            request_timeout_secs: 30,
            jobs: JobsConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.jobs.settlement_hour > 23 {
            return Err(Error::Config(format!(
                "jobs.settlement_hour must be 0-23, got {}",
                self.jobs.settlement_hour
            )));
        }
        if self.jobs.settlement_minute > 59 {
            return Err(Error::Config(format!(
                "jobs.settlement_minute must be 0-59, got {}",
                self.jobs.settlement_minute
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Locate the config file
///
/// Command-line path wins, then the environment variable, then the per-user
/// config directory, then `/etc/dbc/config.toml`. Only the last two are checked
/// for existence; explicit paths are returned as given.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("dbc").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/dbc/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load configuration with graceful degradation
///
/// An explicitly requested file (CLI or ENV) that does not exist is an error;
/// no file at all falls back to compiled defaults.
pub fn load_config(cli_arg: Option<&Path>, env_var_name: &str) -> Result<TomlConfig> {
    let explicit = cli_arg.is_some() || std::env::var(env_var_name).is_ok_and(|v| !v.is_empty());

    match resolve_config_path(cli_arg, env_var_name) {
        Some(path) if path.exists() => {
            let config = TomlConfig::load(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) if explicit => Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        ))),
        _ => {
            warn!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}
