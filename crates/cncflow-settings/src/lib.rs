//! cncflow Settings Crate
//!
//! Handles application configuration: loading, validation and persistence.

pub mod config;
pub mod error;

pub use config::{
    Config, ControllerSettings, EventSettings, LoggingSettings, OutlineSettings,
    ToolChangeSettings,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
