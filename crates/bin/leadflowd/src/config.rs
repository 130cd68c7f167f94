//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `leadflow.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Automation dispatch and recurring job settings.
    pub scheduler: SchedulerConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    /// Pool size for file-backed databases.
    pub max_connections: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Scheduling configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between two scans for delayed executions that came due.
    pub poll_interval_secs: u64,
    /// Maximum executions dispatched per scan.
    pub due_batch_size: u32,
    /// Abort job handlers that outlive their timeout instead of only
    /// logging the overrun.
    pub enforce_timeouts: bool,
}

impl Config {
    /// Load configuration from `leadflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("leadflow.toml")?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("LEADFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("LEADFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(secs) = var("LEADFLOW_POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.scheduler.poll_interval_secs = secs;
        }
        if let Some(val) = var("LEADFLOW_ENFORCE_TIMEOUTS") {
            self.scheduler.enforce_timeouts = matches!(val.as_str(), "1" | "true" | "yes");
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "scheduler.poll_interval_secs must be non-zero".to_string(),
            ));
        }
        if self.scheduler.due_batch_size == 0 {
            return Err(ConfigError::Validation(
                "scheduler.due_batch_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval of the due-execution poller.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:leadflow.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "leadflowd=info,leadflow_app=info,sqlx=warn".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            due_batch_size: 100,
            enforce_timeouts: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
