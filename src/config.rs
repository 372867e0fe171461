//! Configuration module for the Enpal-MQTT bridge
//!
//! Loads configuration from a TOML file with the sections:
//! - [default] - General settings (log_level)
//! - [enpal] - Device page, polling and energy source settings
//! - [wallbox] - Optional wallbox add-on status polling
//! - [mqtt] - MQTT broker settings
//! - [state] - Where derived sensor state is persisted

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::derived::cumulative::DEFAULT_CANDIDATES;
use crate::enpal::{DEFAULT_GROUPS, KNOWN_GROUPS};
use crate::state::DEFAULT_STATE_PATH;

/// Log level for the application
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing LevelFilter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LogLevel::Trace => "TRACE",
                LogLevel::Debug => "DEBUG",
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Error => "ERROR",
            }
        )
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,
    #[serde(default)]
    pub enpal: EnpalConfig,
    #[serde(default)]
    pub wallbox: WallboxConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// General application settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DefaultConfig {
    /// Log level: TRACE, DEBUG, INFO, WARN, ERROR
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Enpal device page configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EnpalConfig {
    /// Full URL of the device messages page
    #[serde(default = "default_enpal_url")]
    pub url: String,

    /// Poll interval (e.g., "60s", "5m")
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// HTTP timeout per fetch
    #[serde(default = "default_enpal_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Card headings to parse; everything else is skipped
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,

    /// DC power sensor names preferred for the energy counter, highest first
    #[serde(default = "default_dc_power_candidates")]
    pub dc_power_candidates: Vec<String>,
}

impl Default for EnpalConfig {
    fn default() -> Self {
        Self {
            url: default_enpal_url(),
            interval: default_interval(),
            timeout: default_enpal_timeout(),
            groups: default_groups(),
            dc_power_candidates: default_dc_power_candidates(),
        }
    }
}

fn default_enpal_url() -> String {
    "http://192.168.178.178/deviceMessages".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_enpal_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_groups() -> Vec<String> {
    DEFAULT_GROUPS.iter().map(|g| g.to_string()).collect()
}

fn default_dc_power_candidates() -> Vec<String> {
    DEFAULT_CANDIDATES.iter().map(|c| c.to_string()).collect()
}

/// Wallbox add-on configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WallboxConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the add-on API (without `/status`)
    #[serde(default = "default_wallbox_url")]
    pub url: String,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_wallbox_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for WallboxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_wallbox_url(),
            interval: default_interval(),
            timeout: default_wallbox_timeout(),
        }
    }
}

fn default_wallbox_url() -> String {
    "http://localhost:36725/wallbox".to_string()
}

fn default_wallbox_timeout() -> Duration {
    Duration::from_secs(15)
}

/// MQTT broker configuration
#[derive(Deserialize, Clone)]
pub struct MqttConfig {
    /// MQTT root topic (e.g., "enpal")
    #[serde(default = "default_mqtt_root")]
    pub root: String,

    /// MQTT broker hostname (unless `socket` is set)
    pub host: Option<String>,

    /// MQTT broker port (default 1883)
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Unix domain socket of the broker, preferred over `host`
    pub socket: Option<String>,

    /// MQTT username (empty: no credentials)
    #[serde(default)]
    pub username: String,

    /// MQTT password
    #[serde(default)]
    pub password: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_mqtt_root() -> String {
    "enpal".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "enpal-mqtt-rs".to_string()
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket", &self.socket)
            .field("username", &self.username)
            .field("password", &"***REDACTED***")
            .field("root", &self.root)
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Persistence settings
#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_PATH)
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the config.toml file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration logic (semantic validation beyond type checks)
    fn validate(&self) -> Result<(), ConfigError> {
        // Schedules align to whole seconds
        if self.enpal.interval < Duration::from_secs(1) {
            return Err(ConfigError::ValidationError(
                "enpal.interval must be at least 1s".to_string(),
            ));
        }

        if self.enpal.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "enpal.url must not be empty".to_string(),
            ));
        }

        if self.enpal.groups.is_empty() {
            return Err(ConfigError::ValidationError(
                "enpal.groups must contain at least one group".to_string(),
            ));
        }

        // Localized devices may use other headings, so unknown groups pass
        for group in &self.enpal.groups {
            if !KNOWN_GROUPS.contains(&group.as_str()) {
                tracing::warn!("Unknown group in enpal.groups: {}", group);
            }
        }

        if self.wallbox.enabled {
            if self.wallbox.interval < Duration::from_secs(1) {
                return Err(ConfigError::ValidationError(
                    "wallbox.interval must be at least 1s".to_string(),
                ));
            }
            if self.wallbox.url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "wallbox.url must not be empty".to_string(),
                ));
            }
        }

        let has_host = self.mqtt.host.as_ref().is_some_and(|h| !h.is_empty());
        if !has_host && self.mqtt.socket.is_none() {
            return Err(ConfigError::ValidationError(
                "mqtt.host or mqtt.socket must be set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
