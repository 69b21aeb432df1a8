//! Allocation and wait requests.

use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};

use super::Endpoint;

/// Lowest port the allocator hands out by default.
pub const DEFAULT_MIN_PORT: u16 = 2000;
/// Highest port the allocator hands out by default.
pub const DEFAULT_MAX_PORT: u16 = 65535;

// ============================================================================
// AllocationRequest
// ============================================================================

/// A request for a free port on `host` within `[min_port, max_port]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRequest {
    host: String,
    min_port: u16,
    max_port: u16,
}

impl AllocationRequest {
    /// Validate and build a request. Both bounds are inclusive.
    pub fn new(host: impl Into<String>, min_port: u16, max_port: u16) -> Result<Self> {
        let host: String = host.into();
        if host.trim().is_empty() {
            return Err(Error::InvalidRequest("host must not be empty".to_string()));
        }
        if min_port == 0 {
            return Err(Error::InvalidRequest(
                "min_port must be at least 1".to_string(),
            ));
        }
        if min_port > max_port {
            return Err(Error::InvalidRequest(format!(
                "min_port {} is greater than max_port {}",
                min_port, max_port
            )));
        }

        Ok(Self {
            host: host.trim().to_string(),
            min_port,
            max_port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn min_port(&self) -> u16 {
        self.min_port
    }

    pub fn max_port(&self) -> u16 {
        self.max_port
    }

    /// Number of ports in the range.
    pub fn range_size(&self) -> u32 {
        u32::from(self.max_port) - u32::from(self.min_port) + 1
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min_port..=self.max_port).contains(&port)
    }

    /// Endpoint for a candidate port on the requested host.
    pub fn endpoint(&self, port: u16) -> Result<Endpoint> {
        Endpoint::new(self.host.clone(), port)
    }
}

// ============================================================================
// WaitRequest
// ============================================================================

/// A request to wait until something listens on `endpoint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitRequest {
    endpoint: Endpoint,
    timeout: Duration,
    poll_interval: Duration,
}

impl WaitRequest {
    /// Build a request. `poll_interval` must be non-zero; a zero `timeout` probes once.
    pub fn new(endpoint: Endpoint, timeout: Duration, poll_interval: Duration) -> Result<Self> {
        Self::check_poll_interval(poll_interval)?;
        Ok(Self {
            endpoint,
            timeout,
            poll_interval,
        })
    }

    /// Build a request from fractional seconds.
    pub fn from_secs(endpoint: Endpoint, timeout_secs: f64, poll_interval_secs: f64) -> Result<Self> {
        let (timeout, poll_interval) = Self::durations_from_secs(timeout_secs, poll_interval_secs)?;
        Self::new(endpoint, timeout, poll_interval)
    }

    /// Validate fractional seconds as a `(timeout, poll_interval)` pair
    /// without needing an endpoint yet.
    pub fn durations_from_secs(
        timeout_secs: f64,
        poll_interval_secs: f64,
    ) -> Result<(Duration, Duration)> {
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|_| {
            Error::InvalidRequest(format!(
                "timeout must be a finite, non-negative number of seconds (got {})",
                timeout_secs
            ))
        })?;
        let poll_interval = Duration::try_from_secs_f64(poll_interval_secs).map_err(|_| {
            Error::InvalidRequest(format!(
                "poll interval must be a finite, positive number of seconds (got {})",
                poll_interval_secs
            ))
        })?;
        Self::check_poll_interval(poll_interval)?;
        Ok((timeout, poll_interval))
    }

    fn check_poll_interval(poll_interval: Duration) -> Result<()> {
        if poll_interval.is_zero() {
            return Err(Error::InvalidRequest(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
