//! App-wide lifecycle signals
//!
//! Coarser than the per-subscriber state callbacks: meant for UI banners
//! and similar global reactions. Each subscriber gets its own unbounded
//! crossbeam channel; senders whose receiver was dropped are pruned on
//! the next broadcast.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Debounced lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    Connected,
    Disconnected,
    /// The connection dropped and recovery started
    StartReconnecting,
    /// Recovery did not succeed within the debounce window
    ConnectionTrulyLost,
}

impl fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleSignal::Connected => write!(f, "connected"),
            LifecycleSignal::Disconnected => write!(f, "disconnected"),
            LifecycleSignal::StartReconnecting => write!(f, "start-reconnecting"),
            LifecycleSignal::ConnectionTrulyLost => write!(f, "connection-truly-lost"),
        }
    }
}

/// Fan-out of lifecycle signals to any number of receivers
#[derive(Clone, Default)]
pub struct LifecycleBroadcaster {
    subscribers: Arc<Mutex<Vec<Sender<LifecycleSignal>>>>,
}

impl LifecycleBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// New independent receiver for all future signals
    pub fn subscribe(&self) -> Receiver<LifecycleSignal> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, signal: LifecycleSignal) {
        info!("Connection lifecycle: {}", signal);
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(signal).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl fmt::Debug for LifecycleBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
