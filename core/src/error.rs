//! Error types for the portgate-core library.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for portgate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code when no probing mechanism could render a verdict.
pub const EXIT_PROBING_UNAVAILABLE: i32 = 127;
/// Exit code when every sampled port was busy.
pub const EXIT_EXHAUSTED_RANGE: i32 = 2;
/// Exit code when the launched service or dependent work failed.
pub const EXIT_SERVICE_FAILED: i32 = 3;
/// Exit code for invalid input or configuration (EX_USAGE).
pub const EXIT_USAGE: i32 = 64;
/// Exit code after an interrupt, matching shells (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors that can occur while allocating ports and waiting for services.
#[derive(Error, Debug)]
pub enum Error {
    /// An endpoint string or value was malformed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An allocation or wait request violated its invariants.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No probe strategy could decide whether the endpoint has a listener.
    #[error("No usable port probing mechanism for {endpoint}")]
    ProbingUnavailable { endpoint: String },

    /// The allocator reached its attempt cap without finding a free port.
    #[error("No free port found on {host} in {min_port}-{max_port} after {attempts} attempts")]
    ExhaustedRange {
        host: String,
        min_port: u16,
        max_port: u16,
        attempts: u32,
    },

    /// Nothing started listening before the timeout.
    #[error("{endpoint} did not start listening within {timeout:?}")]
    TimedOut { endpoint: String, timeout: Duration },

    /// The launched service exited before it started listening.
    #[error("Service exited before becoming ready: {status}")]
    ServiceExited { status: String },

    /// A shutdown request arrived before the launch finished.
    #[error("Launch interrupted: {0}")]
    Interrupted(String),

    /// Failed to spawn or run an external command.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Process exit code for this error.
    ///
    /// `ProbingUnavailable` always maps to 127 so callers can tell
    /// "cannot probe" apart from "probed and busy" or "probed and free".
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ProbingUnavailable { .. } => EXIT_PROBING_UNAVAILABLE,
            Error::ExhaustedRange { .. } => EXIT_EXHAUSTED_RANGE,
            Error::TimedOut { .. } => 1,
            Error::Interrupted(_) => EXIT_INTERRUPTED,
            Error::ServiceExited { .. } | Error::CommandFailed(_) | Error::Io(_) => {
                EXIT_SERVICE_FAILED
            }
            Error::InvalidEndpoint(_)
            | Error::InvalidRequest(_)
            | Error::Json(_)
            | Error::Config(_) => EXIT_USAGE,
        }
    }
}
