//! # Engine Configuration
//!
//! Storage, retry and reporting settings for a Mise deployment.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MISE_DATABASE_PATH=/var/lib/mise/mise.db                           │
//! │     MISE_RETRY_MAX_ATTEMPTS=8                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     path passed to EngineConfig::load                                  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "mise.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//!
//! [reports]
//! popular_items_days = 7
//! popular_items_limit = 10
//!
//! [logging]
//! filter = "info,mise_db=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::pool::DbConfig;
use crate::retry::RetryPolicy;

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a connection waits on a locked database before reporting busy.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("mise.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    20
}

fn default_max_backoff() -> u64 {
    500
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

/// `[reports]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Look-back window for the popular items report.
    #[serde(default = "default_popular_days")]
    pub popular_items_days: u32,

    #[serde(default = "default_popular_limit")]
    pub popular_items_limit: u32,
}

fn default_popular_days() -> u32 {
    7
}

fn default_popular_limit() -> u32 {
    10
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            popular_items_days: default_popular_days(),
            popular_items_limit: default_popular_limit(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_filter(),
        }
    }
}

impl LoggingSettings {
    /// Installs the global fmt subscriber. `RUST_LOG` takes precedence over
    /// `filter`. Does nothing if a subscriber is already installed.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.filter));

        if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
            debug!("Tracing subscriber already installed");
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub reports: ReportSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from file (if present), then environment.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. `MISE_*` environment variables
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                info!(?path, "Loading engine config from file");
                Self::from_toml(&std::fs::read_to_string(path)?)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document; missing sections take their defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }

        if self.reports.popular_items_limit == 0 {
            return Err(ConfigError::Invalid(
                "reports.popular_items_limit must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `MISE_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("MISE_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("MISE_MAX_CONNECTIONS") {
            match value.parse() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %value, "Ignoring invalid MISE_MAX_CONNECTIONS"),
            }
        }

        if let Some(value) = lookup("MISE_BUSY_TIMEOUT_MS") {
            match value.parse() {
                Ok(ms) => self.database.busy_timeout_ms = ms,
                Err(_) => warn!(value = %value, "Ignoring invalid MISE_BUSY_TIMEOUT_MS"),
            }
        }

        if let Some(value) = lookup("MISE_RETRY_MAX_ATTEMPTS") {
            match value.parse() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!(value = %value, "Ignoring invalid MISE_RETRY_MAX_ATTEMPTS"),
            }
        }

        if let Some(filter) = lookup("MISE_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Database settings as a pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .retry(self.retry.policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.reports.popular_items_days, 7);
        assert_eq!(config.reports.popular_items_limit, 10);
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = "/tmp/mise-test.db"

            [retry]
            max_attempts = 9
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/mise-test.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.retry.max_attempts, 9);
        assert_eq!(config.retry.initial_backoff_ms, 20);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MISE_DATABASE_PATH", "/data/mise.db"),
            ("MISE_RETRY_MAX_ATTEMPTS", "3"),
            ("MISE_BUSY_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/mise.db"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml("[database\npath = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_db_config_conversion() {
        let config = EngineConfig::default();
        let db = config.db_config();
        assert_eq!(db.busy_timeout, Duration::from_millis(5_000));
        assert_eq!(db.retry.max_attempts, 5);
    }
}
