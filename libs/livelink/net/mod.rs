//! # LiveLink Net
//!
//! Concrete collaborators for real networks: a tokio-tungstenite
//! [`WsTransport`] with optional pong-based liveness tracking, and a
//! polling reachability monitor probing the endpoint over TCP.

pub mod liveness;
pub mod reachability;
pub mod websocket;

pub use liveness::LivenessTracker;
pub use reachability::{endpoint_port, PollingMonitor, PollingReachability, TcpProbe};
pub use websocket::{client_request, Heartbeat, WsTransport, WsTransportFactory};
