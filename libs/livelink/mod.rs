//! # LiveLink
//!
//! Connection lifecycle manager for a long-lived, authenticated duplex
//! stream (WebSocket by default).
//!
//! ## Features
//!
//! - **Single-owner state machine**: one tokio task owns all state; every public call is a mailbox message
//! - **Liveness watchdog**: silently dead sockets are detected and treated as drops
//! - **Credential-aware recovery**: valid credentials reconnect on a timer, expired ones wait for reachability
//! - **Debounced lifecycle signals**: app-wide `Connected`/`StartReconnecting`/`ConnectionTrulyLost`
//! - **Token-based subscriptions**: any number of state and data observers, removable by handle
//!
//! ## Example
//!
//! ```rust,ignore
//! use livelink::{Credential, ConnectionState};
//! use livelink::net::WsTransportFactory;
//!
//! #[tokio::main]
//! async fn main() -> livelink::Result<()> {
//!     let manager = livelink::builder()
//!         .endpoint("wss://live.example.com/socket")
//!         .transport(WsTransportFactory::new().with_heartbeat(
//!             Duration::from_secs(15),
//!             Duration::from_secs(30),
//!         ))
//!         .build()?;
//!
//!     let token = manager.connect(
//!         Credential::valid_for("token", Duration::from_secs(3600)),
//!         |state| println!("state: {}", state),
//!     );
//!     let data = manager.receive_data(|payload| println!("{} bytes", payload.len()));
//!
//!     // ...
//!
//!     manager.unregister_and_disconnect_if_possible(Some(token), Some(data));
//!     Ok(())
//! }
//! ```

pub mod traits;
pub mod core;
pub mod manager;
pub mod net;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use crate::core::{
    builder::{states, ConnectionManagerBuilder},
    config::{ConfigError, HeartbeatConfig, ManagerConfig, ReachabilityConfig, TimingConfig},
    connection_state::{AtomicConnectionState, ConnectionState},
    credential::Credential,
    lifecycle::{LifecycleBroadcaster, LifecycleSignal},
    registry::{ConnectionToken, DataToken},
    request::{BearerRequestBuilder, Endpoint, HandshakeRequest, RequestBuilder},
};

// Re-export manager
pub use manager::ConnectionManager;

/// Start building a [`ConnectionManager`]
pub fn builder() -> ConnectionManagerBuilder<states::NoEndpoint, states::NoTransport> {
    ConnectionManagerBuilder::new()
}
