//! Subcommand implementations.

pub mod config;
pub mod find_port;
pub mod launch;
pub mod probe;
pub mod wait;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use portgate_core::{AllocationRequest, Config, ConfigStore, Endpoint, WaitRequest};
use tracing::debug;

/// Port range options shared by `find-port` and `launch`.
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// Host whose ports are probed [config: allocation.host]
    #[arg(long)]
    pub host: Option<String>,

    /// Lowest candidate port, inclusive [config: allocation.minPort]
    #[arg(long, value_name = "PORT")]
    pub min: Option<u16>,

    /// Highest candidate port, inclusive [config: allocation.maxPort]
    #[arg(long, value_name = "PORT")]
    pub max: Option<u16>,
}

impl RangeArgs {
    pub fn request(&self, config: &Config) -> Result<AllocationRequest> {
        let allocation = &config.allocation;
        let request = AllocationRequest::new(
            self.host.clone().unwrap_or_else(|| allocation.host.clone()),
            self.min.unwrap_or(allocation.min_port),
            self.max.unwrap_or(allocation.max_port),
        )?;
        Ok(request)
    }
}

/// Readiness options shared by `wait` and `launch`.
#[derive(Args, Debug, Clone, Default)]
pub struct TimingArgs {
    /// Seconds to wait for a listener [config: readiness.timeoutSecs]
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Seconds between probes [config: readiness.pollIntervalSecs]
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<f64>,
}

impl TimingArgs {
    /// Validated `(timeout, poll_interval)`, falling back to the config.
    pub fn durations(&self, config: &Config) -> Result<(Duration, Duration)> {
        let readiness = &config.readiness;
        let durations = WaitRequest::durations_from_secs(
            self.timeout.unwrap_or(readiness.timeout_secs),
            self.interval.unwrap_or(readiness.poll_interval_secs),
        )?;
        Ok(durations)
    }

    pub fn request(&self, config: &Config, endpoint: Endpoint) -> Result<WaitRequest> {
        let (timeout, poll_interval) = self.durations(config)?;
        Ok(WaitRequest::new(endpoint, timeout, poll_interval)?)
    }
}

/// Load configuration from `path`, or from the default location.
pub async fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let store = match path {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::new()?,
    };
    let config = store
        .load()
        .await
        .with_context(|| format!("loading {}", store.path().display()))?;
    debug!(path = %store.path().display(), "Loaded configuration");
    Ok(config)
}
