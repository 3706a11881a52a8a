use cncflow_core::ToolChangeOption;
use cncflow_settings::{Config, ConfigError, SettingsError};
use tempfile::TempDir;

fn sample() -> Config {
    let mut config = Config::new();
    config.tool_change.option = ToolChangeOption::Macro;
    config.tool_change.macro_id = Some("measure-tool".to_string());
    config.tool_change.pre_hook = "G53 G0 Z-5".to_string();
    config.outline.laser_on_outline = true;
    config.outline.timeout_ms = Some(15_000);
    config.logging.json = true;
    config.controller.command_capacity = 32;
    config
}

#[test]
fn toml_file_survives_save_and_load() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("nested").join("config.toml");

    let config = sample();
    config.save_to_file(&path).expect("save");
    let loaded = Config::load_from_file(&path).expect("load");

    assert_eq!(loaded, config);
}

#[test]
fn json_file_survives_save_and_load() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.json");

    let config = sample();
    config.save_to_file(&path).expect("save");
    let loaded = Config::load_from_file(&path).expect("load");

    assert_eq!(loaded.tool_change.to_context().option, ToolChangeOption::Macro);
    assert_eq!(loaded.outline.timeout_ms, Some(15_000));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("absent.toml");

    let config = Config::load_or_default(&path).expect("defaults");
    assert_eq!(config, Config::default());
    assert!(!path.exists());
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[controller]\ncommand_capacity = 0\n").expect("write");

    let err = Config::load_or_default(&path).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Config(ConfigError::ValueOutOfRange { .. })
    ));
}

#[test]
fn malformed_toml_reports_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[outline\nlaser_on_outline = yes").expect("write");

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::TomlError(_))
    ));
}

#[test]
fn invalid_config_is_not_written() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.toml");

    let mut config = Config::new();
    config.outline.timeout_ms = Some(0);
    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}
