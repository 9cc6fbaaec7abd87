//! Configuration
//!
//! Typed configuration loaded from a JSON5 file with environment overrides.
//! A missing file is not an error; every section has defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::display::telegram::{TelegramConfig, DEFAULT_API_BASE};
use crate::logging::LoggingConfig;

/// Overrides the config file location
pub const CONFIG_PATH_ENV: &str = "TALLYBOT_CONFIG_PATH";
/// Overrides `telegram.botToken`
pub const TELEGRAM_TOKEN_ENV: &str = "TALLYBOT_TELEGRAM_TOKEN";
/// Overrides `logging.level`
pub const LOG_LEVEL_ENV: &str = "TALLYBOT_LOG_LEVEL";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid config value at {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telegram display; the console is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramSection>,

    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Telegram section of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramSection {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Session housekeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    /// Drop dialogs untouched for this long; sessions are kept forever when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_ttl_secs: Option<u64>,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: None,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl SessionsConfig {
    /// TTL and sweep interval, when sweeping is enabled
    pub fn sweep(&self) -> Option<(Duration, Duration)> {
        self.idle_ttl_secs.map(|ttl| {
            (
                Duration::from_secs(ttl),
                Duration::from_secs(self.sweep_interval_secs),
            )
        })
    }
}

impl Config {
    /// Telegram display settings, if a token is configured
    pub fn telegram_display(&self) -> Option<TelegramConfig> {
        let section = self.telegram.as_ref()?;
        if section.bot_token.is_empty() {
            return None;
        }
        let mut config = TelegramConfig::new(section.bot_token.clone());
        config.api_base = section
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        if let Some(timeout) = section.timeout_secs {
            config.timeout_secs = timeout;
        }
        Some(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                path: "logging.level".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                path: "sessions.sweepIntervalSecs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if matches!(self.telegram, Some(TelegramSection { timeout_secs: Some(0), .. })) {
            return Err(ConfigError::Invalid {
                path: "telegram.timeoutSecs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Apply overrides from a variable lookup
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var(TELEGRAM_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.telegram.get_or_insert_with(Default::default).bot_token = token;
        }
        if let Some(level) = var(LOG_LEVEL_ENV).filter(|l| !l.is_empty()) {
            self.logging.level = level;
        }
    }
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("tallybot")
        .join("config.json5")
}

/// Config file location, honouring `TALLYBOT_CONFIG_PATH`
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Parse a config file without environment overrides; missing means defaults
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    json5::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the config file, apply environment overrides and validate
pub fn load_config() -> Result<Config, ConfigError> {
    let mut config = load_file(&config_path())?;
    config.apply_env(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}
