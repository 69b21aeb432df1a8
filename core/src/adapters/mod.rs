//! Adapters layer - Host implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter probes the host through one mechanism.

pub mod probe;

// Re-export main types for convenience
pub use probe::{
    ConnectStrategy, PortProbe, RuntimeStrategy, ShellRedirectStrategy, SocketTableStrategy,
};
