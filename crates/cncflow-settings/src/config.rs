//! Configuration management for cncflow
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats stored in platform-specific directories.
//!
//! Configuration is organized into logical sections:
//! - Tool-change handling sent ahead of every upload
//! - Outline request preferences
//! - Event bus sizing
//! - Logging output
//! - Controller command queue

use cncflow_core::{EventBusConfig, ToolChangeContext, ToolChangeOption};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// Tool-change settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolChangeSettings {
    /// Strategy for M6
    pub option: ToolChangeOption,
    /// G-code run before the change
    pub pre_hook: String,
    /// G-code run after the change
    pub post_hook: String,
    /// Macro used when `option` is `Macro`
    pub macro_id: Option<String>,
}

impl ToolChangeSettings {
    /// Payload for the `tool-change-context` command
    pub fn to_context(&self) -> ToolChangeContext {
        ToolChangeContext {
            option: self.option,
            pre_hook: self.pre_hook.clone(),
            post_hook: self.post_hook.clone(),
            macro_id: self.macro_id.clone(),
        }
    }
}

/// Outline preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSettings {
    /// Request laser outlines while the spindle is in laser mode
    pub laser_on_outline: bool,
    /// Abandon an outline after this many milliseconds; unset waits forever
    pub timeout_ms: Option<u64>,
}

impl OutlineSettings {
    /// Timeout as a [`Duration`]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Event bus sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Broadcast channel capacity
    pub channel_capacity: usize,
    /// Keep recent events in memory
    pub enable_history: bool,
    /// Number of events kept when history is on
    pub max_history_size: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        let bus = EventBusConfig::default();
        Self {
            channel_capacity: bus.channel_capacity,
            enable_history: bus.enable_history,
            max_history_size: bus.max_history_size,
        }
    }
}

impl EventSettings {
    /// Event bus configuration for these settings
    pub fn to_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            channel_capacity: self.channel_capacity,
            enable_history: self.enable_history,
            max_history_size: self.max_history_size,
            ..EventBusConfig::default()
        }
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Controller link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Commands that may wait for the IO loop before dispatch fails
    pub command_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            command_capacity: 100,
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
/// Sections missing from a file take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tool-change handling
    pub tool_change: ToolChangeSettings,
    /// Outline preferences
    pub outline: OutlineSettings,
    /// Event bus sizing
    pub events: EventSettings,
    /// Logging output
    pub logging: LoggingSettings,
    /// Controller link
    pub controller: ControllerSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string())
        })?;
        Ok(dir.join("cncflow").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from file, or defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.tool_change.option == ToolChangeOption::Macro
            && self
                .tool_change
                .macro_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            return Err(ConfigError::MissingKey("tool_change.macro_id".to_string()).into());
        }

        if self.outline.timeout_ms == Some(0) {
            return Err(invalid("outline.timeout_ms", "must be > 0 when set"));
        }

        if self.events.channel_capacity == 0 {
            return Err(invalid("events.channel_capacity", "must be > 0"));
        }

        if self.events.enable_history && self.events.max_history_size == 0 {
            return Err(invalid(
                "events.max_history_size",
                "must be > 0 when history is enabled",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging.level", "must not be empty"));
        }

        if self.controller.command_capacity == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "controller.command_capacity".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
