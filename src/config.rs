//! Configuration module for feedbot.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{FeedbotError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedbot.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
    /// Also write log lines to stdout.
    #[serde(default = "default_log_console")]
    pub console: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedbot.log".to_string()
}

fn default_log_console() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            console: default_log_console(),
        }
    }
}

/// Poll loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Run a cycle immediately on startup instead of waiting one interval.
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
    /// Maximum number of feeds processed concurrently within one cycle.
    #[serde(default = "default_max_concurrent_feeds")]
    pub max_concurrent_feeds: usize,
    /// Upper bound on a single feed fetch, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    3600 // 60 minutes
}

fn default_run_on_startup() -> bool {
    true
}

fn default_max_concurrent_feeds() -> usize {
    4
}

fn default_fetch_timeout() -> u64 {
    30
}

impl PollerConfig {
    /// Interval between cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-feed fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            run_on_startup: default_run_on_startup(),
            max_concurrent_feeds: default_max_concurrent_feeds(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// HTTP feed fetching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow loopback and private network hosts (local testing only).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    concat!("feedbot/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            max_feed_size_bytes: default_max_feed_size(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            allow_private_hosts: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Poll loop configuration.
    #[serde(default)]
    pub poller: PollerConfig,
    /// Feed fetching configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedbotError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedbotError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDBOT_DATABASE_PATH`: Override the database file path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FEEDBOT_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            return Err(FeedbotError::Config(
                "poller.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.poller.max_concurrent_feeds == 0 {
            return Err(FeedbotError::Config(
                "poller.max_concurrent_feeds must be greater than zero".to_string(),
            ));
        }
        if self.poller.fetch_timeout_secs == 0 {
            return Err(FeedbotError::Config(
                "poller.fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
