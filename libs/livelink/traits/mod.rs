//! # LiveLink Traits
//!
//! Collaborator seams of the connection lifecycle manager:
//!
//! - **Transport / TransportFactory**: the duplex byte stream
//! - **ReachabilityMonitor / ReachabilityFactory / ReachabilityProbe**: host reachability
//! - **HeaderProvider**: handshake headers
//! - **ReconnectionStrategy**: delay before automatic reconnects

pub mod error;
pub mod headers;
pub mod reachability;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{LiveLinkError, Result};
pub use headers::{HeaderProvider, Headers, NoHeaders, StaticHeaders, DEFAULT_AUTHORIZATION_HEADER};
pub use reachability::{
    NoReachability, ReachabilityFactory, ReachabilityMonitor, ReachabilityProbe, ReachabilitySink,
};
pub use reconnect::{
    ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy, DEFAULT_RECONNECT_DELAY,
};
pub use transport::{SendCompletion, Transport, TransportEvent, TransportEventSink, TransportFactory};
