//! # LiveLink Core
//!
//! The connection state machine and everything it owns: credential,
//! subscriber registry, timers, lifecycle signals and handshake requests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use livelink::core::*;
//! use livelink::net::WsTransportFactory;
//!
//! let manager = livelink::builder()
//!     .endpoint("wss://live.example.com/socket")
//!     .transport(WsTransportFactory::new())
//!     .build()?;
//!
//! let token = manager.connect(
//!     Credential::valid_for("token", Duration::from_secs(3600)),
//!     |state| println!("state: {}", state),
//! )?;
//! ```

pub mod builder;
pub mod command;
pub mod config;
pub mod connection_state;
pub mod credential;
pub mod lifecycle;
pub mod machine;
pub mod registry;
pub mod request;
pub mod timers;

// Re-export main types
pub use builder::{states, ConnectionManagerBuilder};
pub use command::{Command, Input};
pub use config::{
    ConfigError, ConfigResult, HeartbeatConfig, ManagerConfig, ReachabilityConfig, TimingConfig,
};
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use credential::Credential;
pub use lifecycle::{LifecycleBroadcaster, LifecycleSignal};
pub use machine::{Collaborators, ConnectionStateMachine, MachineTiming};
pub use registry::{ConnectionObserver, ConnectionToken, DataObserver, DataToken, ObserverRegistry};
pub use request::{
    BearerRequestBuilder, Endpoint, HandshakeRequest, RequestBuilder, DEFAULT_REQUEST_TIMEOUT,
    SESSION_ID_HEADER,
};
pub use timers::{TimerHandle, TimerKind, TimerScheduler, TimerSlots, TokioScheduler};

// Re-export traits for convenience
pub use crate::traits::*;
