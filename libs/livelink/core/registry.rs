//! Subscriber bookkeeping
//!
//! Subscribers are identified by integer handles rather than by the
//! closures themselves, so removal never depends on reference identity.
//! Notification walks a snapshot of the list: a callback that registers
//! or unregisters through the manager cannot disturb the walk in progress.

use super::connection_state::ConnectionState;
use std::fmt;
use std::sync::Arc;

/// Callback receiving connection state changes
pub type ConnectionObserver = Arc<dyn Fn(ConnectionState) + Send + Sync + 'static>;

/// Callback receiving inbound binary payloads
pub type DataObserver = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Handle for one connection state subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionToken(pub(crate) u64);

/// Handle for one inbound data subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataToken(pub(crate) u64);

impl ConnectionToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl DataToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

impl fmt::Display for DataToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data#{}", self.0)
    }
}

/// Ordered set of subscribers for both notification kinds
#[derive(Default)]
pub struct ObserverRegistry {
    connection: Vec<(ConnectionToken, ConnectionObserver)>,
    data: Vec<(DataToken, DataObserver)>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_connection(&mut self, token: ConnectionToken, observer: ConnectionObserver) {
        self.connection.push((token, observer));
    }

    pub fn register_data(&mut self, token: DataToken, observer: DataObserver) {
        self.data.push((token, observer));
    }

    /// Returns false when the token was not registered
    pub fn unregister_connection(&mut self, token: ConnectionToken) -> bool {
        match self.connection.iter().position(|(t, _)| *t == token) {
            Some(index) => {
                self.connection.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns false when the token was not registered
    pub fn unregister_data(&mut self, token: DataToken) -> bool {
        match self.data.iter().position(|(t, _)| *t == token) {
            Some(index) => {
                self.data.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke one connection observer, if it is still registered
    pub fn notify_one(&self, token: ConnectionToken, state: ConnectionState) {
        if let Some((_, observer)) = self.connection.iter().find(|(t, _)| *t == token) {
            observer(state);
        }
    }

    pub fn notify_connection(&self, state: ConnectionState) {
        let snapshot: Vec<ConnectionObserver> =
            self.connection.iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in snapshot {
            observer(state);
        }
    }

    pub fn notify_data(&self, payload: &[u8]) {
        let snapshot: Vec<DataObserver> = self.data.iter().map(|(_, o)| Arc::clone(o)).collect();
        for observer in snapshot {
            observer(payload);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connection.len()
    }

    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    /// No subscribers of either kind
    pub fn is_empty(&self) -> bool {
        self.connection.is_empty() && self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.connection.clear();
        self.data.clear();
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("connection", &self.connection.len())
            .field("data", &self.data.len())
            .finish()
    }
}
