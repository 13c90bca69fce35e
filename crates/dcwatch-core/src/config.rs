//! Configuration types for the availability watcher
//!
//! This module defines all configuration structures used throughout the workspace.

use serde::{Deserialize, Serialize};

use crate::model::{WatchedConfig, default_watched_configs};

/// Default availability endpoint
pub const DEFAULT_API_BASE_URL: &str =
    "https://www.ovh.com/engine/apiv6/dedicated/server/datacenter/availabilities";

/// Main watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Availability API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Configurations polled on every tick
    #[serde(default = "default_watched_configs")]
    pub watched: Vec<WatchedConfig>,

    /// Poll loop settings
    #[serde(default)]
    pub poll: PollConfig,

    /// Where change notifications go
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl WatcherConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            api: ApiConfig::default(),
            watched: default_watched_configs(),
            poll: PollConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }

    /// Replace the watched list
    pub fn with_watched(mut self, watched: Vec<WatchedConfig>) -> Self {
        self.watched = watched;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.watched.is_empty() {
            return Err(crate::Error::config("No watched configurations"));
        }

        let mut seen = std::collections::HashSet::new();
        for config in &self.watched {
            if config.plan_code.trim().is_empty() {
                return Err(crate::Error::config("Plan code cannot be empty"));
            }
            if config.server.trim().is_empty() {
                return Err(crate::Error::config(format!(
                    "Server cannot be empty for plan {}",
                    config.plan_code
                )));
            }
            // The cache is keyed by plan code
            if !seen.insert(config.plan_code.as_str()) {
                return Err(crate::Error::config(format!(
                    "Plan code {} is watched more than once",
                    config.plan_code
                )));
            }
        }

        self.api.validate()?;
        self.poll.validate()?;
        self.notifier.validate()?;

        Ok(())
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Availability API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Endpoint queried with the watched configuration's parameters
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,

    /// Value of the `excludeDatacenters` query flag
    ///
    /// Must stay `false`: with `true` the API omits the very lists we compare.
    #[serde(default)]
    pub exclude_datacenters: bool,
}

impl ApiConfig {
    /// Validate the API configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_url.is_empty() {
            return Err(crate::Error::config("API base URL cannot be empty"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "API base URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("API timeout must be > 0"));
        }
        if self.exclude_datacenters {
            return Err(crate::Error::config(
                "excludeDatacenters must be false, change detection needs the datacenter lists",
            ));
        }
        Ok(())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout_secs(),
            exclude_datacenters: false,
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between ticks (in milliseconds)
    ///
    /// Ticks fire on this schedule whether or not the previous tick's
    /// requests have completed.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Capacity of the poll event channel
    ///
    /// When full, events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl PollConfig {
    /// Validate the poll configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_ms == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// The tick interval as a Duration
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Log-only, no external notification
    #[default]
    Disabled,

    /// Discord-compatible webhook
    DiscordWebhook {
        /// Webhook URL (treated as a secret)
        url: String,
        /// Display name of the message author
        #[serde(default = "default_webhook_username")]
        username: String,
        /// Avatar of the message author
        #[serde(default = "default_webhook_avatar_url")]
        avatar_url: String,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Disabled => Ok(()),
            NotifierConfig::DiscordWebhook { url, username, .. } => {
                if url.is_empty() {
                    return Err(crate::Error::config("Webhook URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(
                        "Webhook URL must use HTTP or HTTPS scheme",
                    ));
                }
                if username.is_empty() {
                    return Err(crate::Error::config("Webhook username cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &'static str {
        match self {
            NotifierConfig::Disabled => "disabled",
            NotifierConfig::DiscordWebhook { .. } => "discord_webhook",
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_api_timeout_secs() -> u64 {
    5
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Default webhook display name
pub fn default_webhook_username() -> String {
    "OVH Availability".to_string()
}

/// Default webhook avatar
pub fn default_webhook_avatar_url() -> String {
    "https://www.ovh.com/favicon.ico".to_string()
}
