//! Manager configuration
//!
//! Loaded from YAML; every timing has a default matching the fixed
//! constants the lifecycle was designed around.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration of one connection manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// `ws://` or `wss://` endpoint
    pub endpoint: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub timing: TimingConfig,

    /// Treat credentials as expired this many seconds early
    #[serde(default)]
    pub expiry_skew_secs: u64,

    /// Periodic keepalive pings for the WebSocket transport
    #[serde(default)]
    pub heartbeat: Option<HeartbeatConfig>,

    #[serde(default)]
    pub reachability: ReachabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_watchdog_timeout_secs")]
    pub watchdog_timeout_secs: u64,
    #[serde(default = "default_truly_lost_after_secs")]
    pub truly_lost_after_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
    pub pong_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_watchdog_timeout_secs() -> u64 {
    5
}

fn default_truly_lost_after_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_probe_timeout_secs() -> u64 {
    2
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
            truly_lost_after_secs: default_truly_lost_after_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TimingConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs(self.watchdog_timeout_secs)
    }

    pub fn truly_lost_after(&self) -> Duration {
        Duration::from_secs(self.truly_lost_after_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl ReachabilityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl ManagerConfig {
    /// Config with default timings for `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            log_level: default_log_level(),
            timing: TimingConfig::default(),
            expiry_skew_secs: 0,
            heartbeat: None,
            reachability: ReachabilityConfig::default(),
        }
    }

    /// Load configuration from a YAML file
    pub fn load(config_path: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: ManagerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// The endpoint itself is checked when the manager is built.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "endpoint must not be empty".to_string(),
            ));
        }

        let timings = [
            ("reconnect_delay_secs", self.timing.reconnect_delay_secs),
            ("watchdog_timeout_secs", self.timing.watchdog_timeout_secs),
            ("truly_lost_after_secs", self.timing.truly_lost_after_secs),
            ("request_timeout_secs", self.timing.request_timeout_secs),
            ("reachability.poll_interval_secs", self.reachability.poll_interval_secs),
            ("reachability.probe_timeout_secs", self.reachability.probe_timeout_secs),
        ];
        for (name, value) in timings {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if let Some(heartbeat) = &self.heartbeat {
            if heartbeat.interval_secs == 0 {
                return Err(ConfigError::ValidationError(
                    "heartbeat.interval_secs must be greater than 0".to_string(),
                ));
            }
            if heartbeat.pong_timeout_secs < heartbeat.interval_secs {
                return Err(ConfigError::ValidationError(
                    "heartbeat.pong_timeout_secs must be at least heartbeat.interval_secs"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.expiry_skew_secs)
    }

    /// Log the effective configuration
    pub fn log(&self) {
        info!("Endpoint: {}", self.endpoint);
        info!(
            "Timing: reconnect {}s | watchdog {}s | truly lost after {}s | request timeout {}s",
            self.timing.reconnect_delay_secs,
            self.timing.watchdog_timeout_secs,
            self.timing.truly_lost_after_secs,
            self.timing.request_timeout_secs
        );
        match &self.heartbeat {
            Some(heartbeat) => info!(
                "Heartbeat: every {}s, pong timeout {}s",
                heartbeat.interval_secs, heartbeat.pong_timeout_secs
            ),
            None => info!("Heartbeat: disabled"),
        }
    }
}
