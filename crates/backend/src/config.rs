//! Configuration management using config.toml with environment overrides

use cheevo_core::{ConfigError, SortPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONFIG_PATH: &str = "config.toml";

/// Lowest poll interval accepted, whatever the config says
pub const MIN_POLL_INTERVAL_SECS: u64 = 3;

pub const DEFAULT_API_BASE: &str = "https://retroachievements.org/API";
pub const DEFAULT_MEDIA_BASE: &str = "https://media.retroachievements.org";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account whose progress is tracked
    pub username: String,

    /// Web API key for the account
    pub api_key: String,

    /// Seconds between reconciliation ticks (floored to 3)
    pub poll_interval_seconds: u64,

    /// Automatic next-objective selection
    pub next_sort: SortPolicy,

    /// Address the overlay/control server listens on
    pub bind_address: String,

    /// Number of leaderboard entries pushed to the overlay
    pub leaderboard_top: u32,

    /// Window of the backup recent-unlocks feed
    pub backup_lookback_minutes: u32,

    pub api_base_url: String,
    pub media_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            api_key: String::new(),
            poll_interval_seconds: 5,
            next_sort: SortPolicy::List,
            bind_address: "127.0.0.1:4050".to_string(),
            leaderboard_top: 10,
            backup_lookback_minutes: 60,
            api_base_url: DEFAULT_API_BASE.to_string(),
            media_base_url: DEFAULT_MEDIA_BASE.to_string(),
        }
    }
}

impl Config {
    /// Load config.toml (if present) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if Path::new(CONFIG_PATH).exists() {
            let content = fs::read_to_string(CONFIG_PATH)?;
            Self::from_toml(&content)?
        } else {
            tracing::info!("{} not found, using defaults and environment", CONFIG_PATH);
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override fields from `CHEEVO_*` variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CHEEVO_USERNAME") {
            self.username = v;
        }
        if let Some(v) = lookup("CHEEVO_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("CHEEVO_POLL_INTERVAL") {
            self.poll_interval_seconds = v.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("CHEEVO_POLL_INTERVAL is not a number: {}", v))
            })?;
        }
        if let Some(v) = lookup("CHEEVO_NEXT_SORT") {
            self.next_sort = v.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(v) = lookup("CHEEVO_BIND_ADDRESS") {
            self.bind_address = v;
        }
        Ok(())
    }

    /// Check that credentials are present
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid("username is required".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("api_key is required".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(MIN_POLL_INTERVAL_SECS))
    }
}
