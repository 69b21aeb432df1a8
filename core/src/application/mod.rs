//! Application layer - Use case services.
//!
//! Services that compose the probe with domain requests:
//! - [`PortAllocator`] picks a free port in a range
//! - [`ReadinessWaiter`] blocks until a port is listening
//! - [`Launcher`] runs a service on an allocated port and gates dependent
//!   work on its readiness
//!
//! Each service takes its prober through the [`Prober`](crate::ports::Prober)
//! trait, so tests can inject scripted outcomes.

mod allocator;
mod launcher;
mod readiness;

pub use allocator::PortAllocator;
pub use launcher::{CommandSpec, LaunchPlan, LaunchReport, Launcher};
pub use readiness::ReadinessWaiter;
