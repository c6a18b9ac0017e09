//! Host reachability observation
//!
//! A monitor is created for the handshake host together with the
//! transport. It stays idle until the state machine arms it; once armed it
//! reports the next transition to "reachable" through its sink exactly
//! once and then disarms itself.

use crate::core::command::Input;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

/// Watches one host for a change to reachable
pub trait ReachabilityMonitor: Send {
    /// Start listening for the next change to reachable
    fn arm(&mut self);

    /// Stop listening without reporting
    fn disarm(&mut self);

    fn is_armed(&self) -> bool;
}

/// Creates monitors for a host
pub trait ReachabilityFactory: Send + Sync {
    fn create(&self, host: &str, sink: ReachabilitySink) -> Box<dyn ReachabilityMonitor>;
}

/// One-shot check of whether a host can currently be reached
#[async_trait]
pub trait ReachabilityProbe: Send + Sync + 'static {
    async fn is_reachable(&self, host: &str) -> bool;
}

/// Channel from a monitor into the state machine mailbox
#[derive(Debug, Clone)]
pub struct ReachabilitySink {
    generation: u64,
    mailbox: UnboundedSender<Input>,
}

impl ReachabilitySink {
    pub(crate) fn new(generation: u64, mailbox: UnboundedSender<Input>) -> Self {
        Self {
            generation,
            mailbox,
        }
    }

    /// Report that the host became reachable
    pub fn notify_reachable(&self) -> bool {
        self.mailbox
            .send(Input::HostReachable {
                generation: self.generation,
            })
            .is_ok()
    }
}

/// A factory whose monitors never fire
///
/// Useful on platforms without a reachability source; an expired
/// credential then waits for `update` only.
pub struct NoReachability;

struct IdleMonitor {
    armed: bool,
}

impl ReachabilityMonitor for IdleMonitor {
    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}

impl ReachabilityFactory for NoReachability {
    fn create(&self, _host: &str, _sink: ReachabilitySink) -> Box<dyn ReachabilityMonitor> {
        Box::new(IdleMonitor { armed: false })
    }
}
