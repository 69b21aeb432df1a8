//! Domain layer - Pure data models.
//!
//! Endpoints, requests and outcomes. No I/O happens here, so everything
//! in this module can be tested in isolation.

mod endpoint;
mod outcome;
mod request;

pub use endpoint::{Endpoint, DEFAULT_HOST};
pub use outcome::{ProbeOutcome, ReadinessOutcome, StrategyKind};
pub use request::{AllocationRequest, WaitRequest, DEFAULT_MAX_PORT, DEFAULT_MIN_PORT};
