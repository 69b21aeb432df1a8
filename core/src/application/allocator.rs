//! Random-probe port allocation.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::AllocationConfig;
use crate::domain::{AllocationRequest, Endpoint, ProbeOutcome};
use crate::error::{Error, Result};
use crate::ports::Prober;

/// Picks a port that is free right now.
///
/// Ports are drawn uniformly from the requested range and probed until one
/// is free. There is no reservation: another job may bind the port between
/// allocation and the service binding it. Sampling a wide range keeps that
/// window unlikely to matter, and each concurrent allocator re-probes
/// instead of trusting shared state.
pub struct PortAllocator<P: Prober> {
    prober: P,
    config: AllocationConfig,
}

impl<P: Prober> PortAllocator<P> {
    /// Create an allocator with default attempt settings.
    pub fn new(prober: P) -> Self {
        Self::with_config(prober, AllocationConfig::default())
    }

    /// Create an allocator with custom attempt settings.
    pub fn with_config(prober: P, config: AllocationConfig) -> Self {
        Self { prober, config }
    }

    /// The prober used for candidate ports.
    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Allocate a free port within the request's range.
    ///
    /// Fails with [`Error::ProbingUnavailable`] as soon as a candidate cannot
    /// be probed, and with [`Error::ExhaustedRange`] once the attempt cap is
    /// spent on busy ports.
    pub async fn allocate(&self, request: &AllocationRequest) -> Result<Endpoint> {
        let attempts = self.config.attempt_cap(request);
        debug!(
            host = request.host(),
            min_port = request.min_port(),
            max_port = request.max_port(),
            attempts,
            "Allocating port"
        );

        for attempt in 1..=attempts {
            // The rng is not Send; keep it out of the await below.
            let port = rand::thread_rng().gen_range(request.min_port()..=request.max_port());
            let candidate = request.endpoint(port)?;

            match self.prober.probe(&candidate).await {
                ProbeOutcome::Free => {
                    info!(endpoint = %candidate, attempt, "Allocated port");
                    return Ok(candidate);
                }
                ProbeOutcome::InUse => {
                    debug!(port, attempt, "Candidate port in use");
                }
                ProbeOutcome::Indeterminate => {
                    warn!(endpoint = %candidate, "Cannot probe candidate port");
                    return Err(Error::ProbingUnavailable {
                        endpoint: candidate.to_string(),
                    });
                }
            }
        }

        warn!(
            host = request.host(),
            min_port = request.min_port(),
            max_port = request.max_port(),
            attempts,
            "No free port found"
        );
        Err(Error::ExhaustedRange {
            host: request.host().to_string(),
            min_port: request.min_port(),
            max_port: request.max_port(),
            attempts,
        })
    }
}
