//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with the host. Implementations live in `adapters`.

mod prober;
mod strategy;

pub use prober::Prober;
pub use strategy::ProbeStrategy;
