//! # LiveLink Manager
//!
//! The public facade: a cloneable handle whose calls are serialized onto
//! the task owning the connection state machine.

pub mod manager;

pub use manager::ConnectionManager;
