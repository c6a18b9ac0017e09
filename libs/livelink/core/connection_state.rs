use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Logical, application-visible connection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Closed by `close()`; no subscribers, no transport
    Closed,
    /// Not connected, either initially or after `disconnect()`
    Disconnected,
    /// A connection attempt is underway
    Connecting,
    Connected,
    /// Dropped unexpectedly. `needs_credential_refresh` tells callers a new
    /// credential is required before reconnecting can succeed.
    ConnectionLost { needs_credential_refresh: bool },
}

impl ConnectionState {
    /// Same variant, ignoring the `ConnectionLost` payload
    #[inline]
    pub fn same_phase(&self, other: &ConnectionState) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Whether moving from `self` to `next` must be announced to subscribers
    ///
    /// Variant changes always are. Two `ConnectionLost` values with a
    /// different refresh flag are too, since callers act on the flag.
    pub fn should_notify(&self, next: &ConnectionState) -> bool {
        !self.same_phase(next) || self != next
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    #[inline]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, ConnectionState::ConnectionLost { .. })
    }

    /// Closed or Disconnected
    #[inline]
    pub fn is_stopped(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Disconnected)
    }

    fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Closed => 0,
            ConnectionState::Disconnected => 1,
            ConnectionState::Connecting => 2,
            ConnectionState::Connected => 3,
            ConnectionState::ConnectionLost {
                needs_credential_refresh: false,
            } => 4,
            ConnectionState::ConnectionLost {
                needs_credential_refresh: true,
            } => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Closed,
            2 => ConnectionState::Connecting,
            3 => ConnectionState::Connected,
            4 => ConnectionState::ConnectionLost {
                needs_credential_refresh: false,
            },
            5 => ConnectionState::ConnectionLost {
                needs_credential_refresh: true,
            },
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::ConnectionLost {
                needs_credential_refresh,
            } => write!(
                f,
                "connection lost (needs credential refresh: {})",
                needs_credential_refresh
            ),
        }
    }
}

/// Lock-free mirror of the current state
///
/// Only the task owning the state machine writes it; any handle may read
/// it to answer `is_connected()` without a round trip through the mailbox.
#[derive(Debug)]
pub struct AtomicConnectionState {
    state: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(state.to_u8()),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get().is_connected()
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}
