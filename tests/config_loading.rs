//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality and the
//! shipped configuration file.

use livelink_console::bin_common::{load_config_from_env, ConfigType};
use livelink_console::livelink::ManagerConfig;
use std::env;
use std::path::Path;
use std::time::Duration;

#[test]
fn test_manager_config_default() {
    // Clear env var to test default
    env::remove_var("LIVELINK_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Manager);
    assert_eq!(config_path.to_str().unwrap(), "config/livelink.yaml");
}

#[test]
fn test_custom_config() {
    env::remove_var("CONFIG_PATH");

    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_shipped_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/livelink.yaml");
    let config = ManagerConfig::load(&path).unwrap();

    assert!(config.endpoint.starts_with("wss://"));
    assert_eq!(config.timing.reconnect_delay(), Duration::from_secs(5));
    assert_eq!(config.timing.watchdog_timeout(), Duration::from_secs(5));
    assert_eq!(config.timing.truly_lost_after(), Duration::from_secs(10));
    assert_eq!(config.expiry_skew(), Duration::ZERO);
    assert!(config.heartbeat.is_some());
}

#[test]
fn test_missing_config_file_is_an_error() {
    assert!(ManagerConfig::load("config/does-not-exist.yaml").is_err());
}
