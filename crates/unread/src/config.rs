//! Settings loading for the notifier
//!
//! Supports loading the API token from (in order of priority):
//! 1. The `SLACK_TOKEN` environment variable
//! 2. `settings.json` in the slackbadge config directory
//!
//! The settings file is owned by the options surface (`slackbadge set-token`).
//! This crate only reads it, and writes it on explicit request.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename in the slackbadge config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Environment variable that overrides the stored token
pub const TOKEN_ENV: &str = "SLACK_TOKEN";

/// Persistent notifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// API token; empty means "not configured"
    #[serde(default)]
    pub token: String,
    /// Base URL for Web API calls, without trailing slash
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Seconds between periodic snapshot refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Web API method that hands out the realtime stream URL
    #[serde(default = "default_stream_connect_method")]
    pub stream_connect_method: String,
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_stream_connect_method() -> String {
    "rtm.connect".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base_url: default_api_base_url(),
            refresh_interval_secs: default_refresh_interval_secs(),
            stream_connect_method: default_stream_connect_method(),
        }
    }
}

impl Settings {
    /// Load settings from the config directory, then apply `SLACK_TOKEN`.
    ///
    /// A missing settings file yields defaults rather than an error.
    pub fn load() -> Result<Self> {
        let mut settings = if config::config_exists(SETTINGS_FILE) {
            config::load_json::<Settings>(SETTINGS_FILE)?
        } else {
            Settings::default()
        };

        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.trim().is_empty()
        {
            settings.token = token;
        }

        Ok(settings)
    }

    /// Load settings from a specific JSON file (no environment overrides)
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Persist these settings to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }

    /// The configured token, if any
    pub fn token(&self) -> Option<&str> {
        let token = self.token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Get the settings file path (~/.config/slackbadge/settings.json)
    pub fn default_settings_path() -> Option<PathBuf> {
        config::config_path(SETTINGS_FILE)
    }
}
