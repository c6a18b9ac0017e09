//! Pong-based liveness tracking
//!
//! Detects half-open WebSocket connections: the heartbeat records every
//! ping it writes, the read loop records every pong, and a ping left
//! unanswered for longer than the timeout marks the path as not viable.
//! Viability changes are reported once per edge, so the state machine sees
//! `ViabilityChanged(false)` when pongs stop and `ViabilityChanged(true)`
//! once they come back.

use std::time::Duration;
use tokio::time::Instant;

/// Tracks ping/pong timing for one open connection
#[derive(Debug)]
pub struct LivenessTracker {
    /// No pong within this duration after a ping means the path is not viable
    timeout: Duration,
    last_ping_sent: Option<Instant>,
    last_pong_received: Option<Instant>,
    viable: bool,
}

impl LivenessTracker {
    /// Create a new tracker with the specified timeout
    ///
    /// # Arguments
    /// * `timeout` - Duration to wait for a pong after a ping (recommended: 2x heartbeat interval)
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_ping_sent: None,
            last_pong_received: None,
            viable: true,
        }
    }

    pub fn record_ping_sent(&mut self) {
        self.last_ping_sent = Some(Instant::now());
    }

    /// Record a pong. Returns `Some(true)` if this restored viability.
    pub fn record_pong_received(&mut self) -> Option<bool> {
        self.last_pong_received = Some(Instant::now());
        self.transition(true)
    }

    /// Whether the last ping was answered or is still within the timeout
    pub fn is_healthy(&self) -> bool {
        let Some(ping) = self.last_ping_sent else {
            return true;
        };

        if matches!(self.last_pong_received, Some(pong) if pong >= ping) {
            return true;
        }

        ping.elapsed() < self.timeout
    }

    /// Re-evaluate health. Returns `Some(false)` when the path just became non-viable.
    pub fn check(&mut self) -> Option<bool> {
        let healthy = self.is_healthy();
        self.transition(healthy)
    }

    fn transition(&mut self, viable: bool) -> Option<bool> {
        if self.viable == viable {
            return None;
        }
        self.viable = viable;
        Some(viable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_healthy_before_first_ping() {
        let mut tracker = LivenessTracker::new(Duration::from_secs(30));
        assert!(tracker.is_healthy());
        assert_eq!(tracker.check(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_within_timeout() {
        let mut tracker = LivenessTracker::new(Duration::from_secs(30));
        tracker.record_ping_sent();
        advance(Duration::from_secs(29)).await;

        assert!(tracker.is_healthy());
        assert_eq!(tracker.check(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_ping_reports_loss_once() {
        let mut tracker = LivenessTracker::new(Duration::from_secs(30));
        tracker.record_ping_sent();
        advance(Duration::from_secs(31)).await;

        assert!(!tracker.is_healthy());
        assert_eq!(tracker.check(), Some(false));
        assert_eq!(tracker.check(), None);

        // Still down on the next unanswered ping, so nothing new to report
        tracker.record_ping_sent();
        advance(Duration::from_secs(31)).await;
        assert_eq!(tracker.check(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_restores_viability() {
        let mut tracker = LivenessTracker::new(Duration::from_secs(30));
        tracker.record_ping_sent();
        advance(Duration::from_secs(31)).await;
        tracker.check();

        assert_eq!(tracker.record_pong_received(), Some(true));
        assert_eq!(tracker.record_pong_received(), None);
        assert!(tracker.is_healthy());
    }
}
