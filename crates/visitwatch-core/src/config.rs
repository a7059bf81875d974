//! VisitWatch app configuration.
//!
//! Loaded from `~/.visitwatch/config.toml`; every field has a default so a
//! missing file yields a runnable (if transport-less) configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WatchError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Root of all per-user state. Defaults to `~/.visitwatch`.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Seconds between digest scheduler ticks.
    #[serde(default = "default_tick_secs")]
    pub tick_interval_secs: u64,
    /// Minutes of tolerance around a user's delivery time.
    #[serde(default = "default_tolerance_mins")]
    pub window_tolerance_mins: i64,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub pushover: PushoverConfig,
}

fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".visitwatch")
}
fn default_tick_secs() -> u64 {
    120
}
fn default_tolerance_mins() -> i64 {
    5
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            tick_interval_secs: default_tick_secs(),
            window_tolerance_mins: default_tolerance_mins(),
            detector: DetectorConfig::default(),
            smtp: SmtpConfig::default(),
            pushover: PushoverConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Load config from the default path, or defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| WatchError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Default config path (`~/.visitwatch/config.toml`).
    pub fn default_path() -> PathBuf {
        default_data_root().join("config.toml")
    }
}

/// Change detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Collapse an added/removed pair at the same store into one `swapped`
    /// record when the dates are close.
    #[serde(default = "bool_true")]
    pub collapse_swaps: bool,
    /// Maximum days between the removed and added dates for a swap match.
    #[serde(default = "default_swap_window_days")]
    pub swap_window_days: i64,
}

fn bool_true() -> bool {
    true
}
fn default_swap_window_days() -> i64 {
    7
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            collapse_swaps: true,
            swap_window_days: default_swap_window_days(),
        }
    }
}

/// SMTP submission settings for the email channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// From address; empty disables the email channel entirely.
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            from_name: None,
        }
    }
}

impl SmtpConfig {
    /// The channel is usable only with a from address and credentials.
    pub fn is_configured(&self) -> bool {
        !self.from_address.is_empty() && !self.username.is_empty()
    }
}

/// Pushover application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushoverConfig {
    /// Application API token; empty disables the Pushover channel.
    #[serde(default)]
    pub app_token: String,
}

impl PushoverConfig {
    pub fn is_configured(&self) -> bool {
        !self.app_token.is_empty()
    }
}
