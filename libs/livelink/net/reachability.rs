//! Polling reachability monitor
//!
//! While armed, a background task probes the host at a fixed interval. The
//! first probe only establishes the baseline; the monitor fires on the
//! first reachable probe that follows an unreachable one, then disarms.

use crate::core::config::ManagerConfig;
use crate::traits::{ReachabilityFactory, ReachabilityMonitor, ReachabilityProbe, ReachabilitySink};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::http::Uri;
use tracing::debug;

/// Reachable means a TCP connection to `host:port` succeeds in time
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    /// Probe the port the endpoint URL would connect to
    pub fn for_endpoint(url: &str, timeout: Duration) -> Self {
        Self::new(endpoint_port(url), timeout)
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn is_reachable(&self, host: &str) -> bool {
        let connect = TcpStream::connect((host, self.port));
        matches!(tokio::time::timeout(self.timeout, connect).await, Ok(Ok(_)))
    }
}

/// Explicit port, otherwise 443 for `wss` and 80 for anything else
pub fn endpoint_port(url: &str) -> u16 {
    match url.parse::<Uri>() {
        Ok(uri) => uri.port_u16().unwrap_or(match uri.scheme_str() {
            Some("wss") => 443,
            _ => 80,
        }),
        Err(_) => 443,
    }
}

/// Factory for [`PollingMonitor`]s sharing one probe
#[derive(Clone)]
pub struct PollingReachability {
    probe: Arc<dyn ReachabilityProbe>,
    poll_interval: Duration,
}

impl PollingReachability {
    pub fn new(probe: impl ReachabilityProbe, poll_interval: Duration) -> Self {
        Self {
            probe: Arc::new(probe),
            poll_interval,
        }
    }

    /// TCP probe against the configured endpoint
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(
            TcpProbe::for_endpoint(&config.endpoint, config.reachability.probe_timeout()),
            config.reachability.poll_interval(),
        )
    }
}

impl ReachabilityFactory for PollingReachability {
    fn create(&self, host: &str, sink: ReachabilitySink) -> Box<dyn ReachabilityMonitor> {
        Box::new(PollingMonitor {
            host: host.to_string(),
            probe: Arc::clone(&self.probe),
            poll_interval: self.poll_interval,
            sink,
            task: None,
        })
    }
}

pub struct PollingMonitor {
    host: String,
    probe: Arc<dyn ReachabilityProbe>,
    poll_interval: Duration,
    sink: ReachabilitySink,
    task: Option<JoinHandle<()>>,
}

impl ReachabilityMonitor for PollingMonitor {
    fn arm(&mut self) {
        if self.is_armed() {
            return;
        }

        debug!("Watching reachability of {}", self.host);
        self.task = Some(tokio::spawn(poll_until_reachable(
            self.host.clone(),
            Arc::clone(&self.probe),
            self.poll_interval,
            self.sink.clone(),
        )));
    }

    fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Armed until it fires or is disarmed
    fn is_armed(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl Drop for PollingMonitor {
    fn drop(&mut self) {
        self.disarm();
    }
}

async fn poll_until_reachable(
    host: String,
    probe: Arc<dyn ReachabilityProbe>,
    poll_interval: Duration,
    sink: ReachabilitySink,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut seen_unreachable = false;

    loop {
        ticker.tick().await;

        let reachable = probe.is_reachable(&host).await;
        debug!("Reachability probe for {}: {}", host, reachable);

        if !reachable {
            seen_unreachable = true;
        } else if seen_unreachable {
            debug!("{} became reachable", host);
            sink.notify_reachable();
            return;
        }
    }
}
