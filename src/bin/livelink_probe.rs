//! Probe binary for the LiveLink connection manager
//!
//! Opens one managed WebSocket connection, logs every state change and
//! lifecycle signal, and periodically reports what it has received.
//!
//! Usage:
//!   cargo run --bin livelink_probe [config-path]
//!
//! Required environment variables:
//!   LIVELINK_TOKEN - Credential token sent in the Authorization header
//!
//! Optional environment variables:
//!   LIVELINK_TOKEN_TTL_SECS - Credential lifetime (default 3600)
//!   LIVELINK_CONFIG_PATH - Config file (default config/livelink.yaml)

use anyhow::{Context, Result};
use chrono::Utc;
use livelink_console::bin_common::{
    init_logging, load_config_from_env, parse_args, token_ttl_from_env, BinaryRunner, ConfigType,
    RunConfig,
};
use livelink_console::livelink::{
    ConnectionManager, ConnectionState, Credential, LifecycleSignal, ManagerConfig,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

struct Probe {
    run_config: RunConfig,
    manager: ConnectionManager,
    token_ttl: Duration,
    bytes_received: Arc<AtomicU64>,
    frames_received: Arc<AtomicU64>,
}

impl Probe {
    fn new(manager: ConnectionManager, token_ttl: Duration) -> Self {
        Self {
            run_config: RunConfig::new("LiveLink probe").with_status_interval(10),
            manager,
            token_ttl,
            bytes_received: Arc::new(AtomicU64::new(0)),
            frames_received: Arc::new(AtomicU64::new(0)),
        }
    }

    fn log_status(&self) {
        info!(
            "[Status] state: {} | frames: {} | bytes: {}",
            self.manager.connection_state(),
            self.frames_received.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed)
        );
    }
}

impl BinaryRunner for Probe {
    async fn run(&mut self) -> Result<()> {
        let connection = self.manager.connect(
            Credential::valid_for(token_from_env()?, self.token_ttl),
            |state| match state {
                ConnectionState::ConnectionLost {
                    needs_credential_refresh: true,
                } => warn!("Connection lost and the credential has expired, set a fresh LIVELINK_TOKEN"),
                state => info!("Connection state: {}", state),
            },
        );

        let bytes = Arc::clone(&self.bytes_received);
        let frames = Arc::clone(&self.frames_received);
        let data = self.manager.receive_data(move |payload| {
            frames.fetch_add(1, Ordering::Relaxed);
            bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
        });

        let signals = self.manager.lifecycle_events();
        let mut status = tokio::time::interval(Duration::from_secs(self.run_config.status_interval_secs));
        let mut drain = tokio::time::interval(Duration::from_millis(250));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl+C received, shutting down");
                    break;
                }
                _ = status.tick() => self.log_status(),
                _ = drain.tick() => {
                    for signal in signals.try_iter() {
                        match signal {
                            LifecycleSignal::ConnectionTrulyLost => {
                                warn!("[Lifecycle] {} at {}", signal, Utc::now().format("%H:%M:%S"))
                            }
                            _ => info!("[Lifecycle] {}", signal),
                        }
                    }
                }
            }
        }

        self.manager
            .unregister_and_disconnect_if_possible(Some(connection), Some(data));
        let final_state = self.manager.shutdown().await?;
        info!("Final state: {}", final_state);
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn summary(&self) -> Option<String> {
        Some(format!(
            "Received {} frames ({} bytes)",
            self.frames_received.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed)
        ))
    }
}

fn token_from_env() -> Result<String> {
    std::env::var("LIVELINK_TOKEN").context("LIVELINK_TOKEN environment variable not set")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenv::dotenv().ok();

    let config_path = parse_args()
        .into_iter()
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| load_config_from_env(ConfigType::Manager));

    let config = ManagerConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_logging(&config.log_level);
    config.log();

    // Fail before connecting when the token is missing
    token_from_env()?;

    let manager = ConnectionManager::websocket(&config, Credential::empty())?;
    Probe::new(manager, token_ttl_from_env()).execute().await
}
