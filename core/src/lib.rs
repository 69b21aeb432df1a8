//! portgate Core Library
//!
//! Port allocation and readiness synchronization for services that share a
//! host with other, independently scheduled jobs.
//! Provides functionality to:
//! - Probe whether a TCP endpoint has a listener, using whichever mechanism
//!   the host offers
//! - Allocate a random free port in a range
//! - Wait, with a bound, until a launched service starts listening
//! - Launch a service on an allocated port and gate dependent work on it
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: Host probing implementations
//! - `application`: Use case services
//!
//! # Probe strategies
//! In default order: direct TCP connect, the socket table (`ss` or `lsof`),
//! bash `/dev/tcp`, then `python` and `python3`. A strategy that cannot run
//! is skipped. If none can run the outcome is
//! [`ProbeOutcome::Indeterminate`], which is never treated as free.

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    AllocationRequest, Endpoint, ProbeOutcome, ReadinessOutcome, StrategyKind, WaitRequest,
};

// Re-export other commonly used types
pub use adapters::PortProbe;
pub use application::{CommandSpec, LaunchPlan, LaunchReport, Launcher, PortAllocator, ReadinessWaiter};
pub use config::{Config, ConfigStore};
pub use error::{Error, Result};
pub use ports::{ProbeStrategy, Prober};
