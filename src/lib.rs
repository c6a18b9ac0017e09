//! LiveLink Console - Main Library
//!
//! Binary-side helpers around the `livelink` connection manager.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **livelink**: Connection lifecycle manager (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use livelink_console::bin_common::{load_config_from_env, ConfigType};
//! use livelink_console::livelink::ManagerConfig;
//! ```

// Re-export workspace libraries for convenience
pub use livelink;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{init_logging, load_config_from_env, parse_args, token_ttl_from_env, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
