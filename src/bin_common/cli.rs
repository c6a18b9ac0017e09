//! CLI utilities for binaries
//!
//! Handles configuration loading, environment variables and logging
//! setup for all binary executables.

use std::path::PathBuf;
use std::time::Duration;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Connection manager configuration (config/livelink.yaml)
    Manager,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Manager => "config/livelink.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Manager => "LIVELINK_CONFIG_PATH",
            ConfigType::Custom(_) => "CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Arguments
/// * `config_type` - Type of configuration to load
///
/// # Returns
/// Path to the configuration file
///
/// # Examples
/// ```
/// use livelink_console::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Manager);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Credential lifetime in seconds from `LIVELINK_TOKEN_TTL_SECS`, one hour if unset or invalid
pub fn token_ttl_from_env() -> Duration {
    let secs = std::env::var("LIVELINK_TOKEN_TTL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(3600);
    Duration::from_secs(secs)
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
