//! Configuration for probing, allocation and readiness defaults.
//!
//! Stored in JSON format at `~/.portgate/config.json`. The location can be
//! overridden with the `PORTGATE_CONFIG` environment variable.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::{
    AllocationRequest, Endpoint, StrategyKind, WaitRequest, DEFAULT_HOST, DEFAULT_MAX_PORT,
    DEFAULT_MIN_PORT,
};
use crate::error::{Error, Result};

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "PORTGATE_CONFIG";

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Probe strategy order and timeouts.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Default allocation range and attempt cap.
    #[serde(default)]
    pub allocation: AllocationConfig,

    /// Default readiness timeout and poll interval.
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

impl Config {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.probe.strategies.is_empty() {
            return Err(Error::Config("probe.strategies must not be empty".to_string()));
        }
        if self.probe.connect_timeout_ms == 0 || self.probe.command_timeout_ms == 0 {
            return Err(Error::Config("probe timeouts must be greater than zero".to_string()));
        }
        if self.allocation.attempts_per_port == 0 || self.allocation.min_attempts == 0 {
            return Err(Error::Config(
                "allocation attempt settings must be greater than zero".to_string(),
            ));
        }
        if self.allocation.min_attempts > self.allocation.max_attempts {
            return Err(Error::Config(format!(
                "allocation.minAttempts {} exceeds allocation.maxAttempts {}",
                self.allocation.min_attempts, self.allocation.max_attempts
            )));
        }
        self.allocation.request()?;
        self.readiness.request(Endpoint::local(1)?)?;
        Ok(())
    }
}

/// Probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Strategies in preference order.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,

    /// Timeout for a single TCP connect in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Timeout for an external probe tool in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_strategies() -> Vec<StrategyKind> {
    StrategyKind::ALL.to_vec()
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}

fn default_command_timeout_ms() -> u64 {
    5_000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

/// Allocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationConfig {
    /// Host whose ports are probed.
    #[serde(default = "default_host")]
    pub host: String,

    /// Lowest candidate port (inclusive).
    #[serde(default = "default_min_port")]
    pub min_port: u16,

    /// Highest candidate port (inclusive).
    #[serde(default = "default_max_port")]
    pub max_port: u16,

    /// Attempts granted per port in the range.
    #[serde(default = "default_attempts_per_port")]
    pub attempts_per_port: u32,

    /// Lower bound on the attempt cap.
    #[serde(default = "default_min_attempts")]
    pub min_attempts: u32,

    /// Upper bound on the attempt cap.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_min_port() -> u16 {
    DEFAULT_MIN_PORT
}

fn default_max_port() -> u16 {
    DEFAULT_MAX_PORT
}

fn default_attempts_per_port() -> u32 {
    10
}

fn default_min_attempts() -> u32 {
    32
}

fn default_max_attempts() -> u32 {
    4096
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            min_port: default_min_port(),
            max_port: default_max_port(),
            attempts_per_port: default_attempts_per_port(),
            min_attempts: default_min_attempts(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl AllocationConfig {
    /// Build an allocation request from the configured range.
    pub fn request(&self) -> Result<AllocationRequest> {
        AllocationRequest::new(self.host.clone(), self.min_port, self.max_port)
    }

    /// Attempt cap for a request: proportional to the range, clamped.
    pub fn attempt_cap(&self, request: &AllocationRequest) -> u32 {
        let max = self.max_attempts.max(1);
        let min = self.min_attempts.clamp(1, max);
        request
            .range_size()
            .saturating_mul(self.attempts_per_port)
            .clamp(min, max)
    }
}

/// Readiness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessConfig {
    /// How long to wait for a listener, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    /// Delay between probes, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
}

fn default_timeout_secs() -> f64 {
    30.0
}

fn default_poll_interval_secs() -> f64 {
    0.5
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ReadinessConfig {
    /// Build a wait request for `endpoint` from the configured timings.
    pub fn request(&self, endpoint: Endpoint) -> Result<WaitRequest> {
        WaitRequest::from_secs(endpoint, self.timeout_secs, self.poll_interval_secs)
    }
}

/// Configuration store.
///
/// Handles reading and writing configuration to `~/.portgate/config.json`.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `$PORTGATE_CONFIG`, else `~/.portgate/config.json`
    pub fn new() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(Self::with_path(PathBuf::from(path)));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        let config_dir = home.join(".portgate");
        let config_path = config_dir.join("config.json");

        Ok(Self { config_path })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Get the configuration file path.
    pub fn path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;

        if let Some(config_dir) = self.config_path.parent() {
            if !config_dir.as_os_str().is_empty() {
                fs::create_dir_all(config_dir).await.map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }
}
