//! Configuration loading and management
//!
//! Values come from built-in defaults, then the optional `settings.json`
//! in the data directory, then `QUICKCAP_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::hotkey::{codes, key_code_from_name, DEFAULT_THRESHOLD_MS};

/// Default reminder backend
pub const DEFAULT_BASE_URL: &str = "https://example.com";

/// Default bound on a single reminder creation request
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

const SETTINGS_FILE: &str = "settings.json";

/// Errors in persisted settings or environment overrides
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown trigger key: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Virtual key code whose double press opens the capture surface
    pub trigger_key_code: u16,

    /// Maximum gap between the two presses of the gesture
    pub double_press_threshold: Duration,

    /// Reminder backend base address
    pub base_url: String,

    /// Enables local notifications for created reminders
    pub sync_enabled: bool,

    /// Bound on a single reminder creation request
    pub request_timeout: Duration,

    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,
}

/// Settings for the hotkey service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyConfig {
    pub trigger_key_code: u16,
    pub threshold: Duration,
}

/// Settings for the submission pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

/// Trigger key as written in the settings file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum TriggerKey {
    /// Virtual key code, e.g. `44`
    Code(u16),
    /// Key name or code string, e.g. `"slash"` or `"0x2C"`
    Name(String),
}

impl TriggerKey {
    fn key_code(self) -> Result<u16, ConfigError> {
        match self {
            TriggerKey::Code(code) => Ok(code),
            TriggerKey::Name(name) => key_code_from_name(&name).ok_or(ConfigError::UnknownKey(name)),
        }
    }
}

/// Persisted key/value settings, all optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    trigger_key: Option<TriggerKey>,
    double_press_threshold_ms: Option<u64>,
    base_url: Option<String>,
    sync_enabled: Option<bool>,
    request_timeout_ms: Option<u64>,
    socket_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the settings file, environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("quickcap");

        let settings = read_settings(&data_dir.join(SETTINGS_FILE))?;
        let config = Self::from_sources(data_dir, settings, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Resolve configuration from parsed settings and an environment lookup
    fn from_sources(
        data_dir: PathBuf,
        settings: Settings,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let trigger_key = env("QUICKCAP_TRIGGER_KEY")
            .map(TriggerKey::Name)
            .or(settings.trigger_key);
        let trigger_key_code = match trigger_key {
            Some(key) => key.key_code()?,
            None => codes::SLASH,
        };

        let threshold_ms = match env("QUICKCAP_THRESHOLD_MS") {
            Some(value) => parse_millis("QUICKCAP_THRESHOLD_MS", &value)?,
            None => settings.double_press_threshold_ms.unwrap_or(DEFAULT_THRESHOLD_MS),
        };
        if threshold_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "double_press_threshold_ms",
                value: threshold_ms.to_string(),
            });
        }

        let timeout_ms = match env("QUICKCAP_REQUEST_TIMEOUT_MS") {
            Some(value) => parse_millis("QUICKCAP_REQUEST_TIMEOUT_MS", &value)?,
            None => settings
                .request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        };
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_ms",
                value: timeout_ms.to_string(),
            });
        }

        let sync_enabled = match env("QUICKCAP_SYNC_ENABLED") {
            Some(value) => parse_bool("QUICKCAP_SYNC_ENABLED", &value)?,
            None => settings.sync_enabled.unwrap_or(true),
        };

        // The backend address is validated per submission, not here
        let base_url = env("QUICKCAP_BASE_URL")
            .or(settings.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let socket_path = env("QUICKCAP_SOCKET")
            .map(PathBuf::from)
            .or(settings.socket_path)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        Ok(Self {
            trigger_key_code,
            double_press_threshold: Duration::from_millis(threshold_ms),
            base_url,
            sync_enabled,
            request_timeout: Duration::from_millis(timeout_ms),
            socket_path,
            data_dir,
        })
    }

    pub fn hotkey(&self) -> HotkeyConfig {
        HotkeyConfig {
            trigger_key_code: self.trigger_key_code,
            threshold: self.double_press_threshold,
        }
    }

    pub fn submission(&self) -> SubmissionConfig {
        SubmissionConfig {
            base_url: self.base_url.clone(),
            request_timeout: self.request_timeout,
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

/// Read the settings file; a missing file yields defaults
fn read_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_owned(),
                source,
            })
        }
    };

    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn parse_millis(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
