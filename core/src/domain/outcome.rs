//! Probe and readiness outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::Endpoint;

// ============================================================================
// ProbeOutcome
// ============================================================================

/// Verdict of a liveness probe against an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeOutcome {
    /// Nothing is listening.
    Free,
    /// A listener accepted (or reset) the connection.
    InUse,
    /// No probing mechanism could decide. Never to be read as `Free`.
    Indeterminate,
}

impl ProbeOutcome {
    /// `Free` or `InUse`.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, ProbeOutcome::Indeterminate)
    }

    /// Process exit code: 0 in use, 1 free, 127 undecidable.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeOutcome::InUse => 0,
            ProbeOutcome::Free => 1,
            ProbeOutcome::Indeterminate => crate::error::EXIT_PROBING_UNAVAILABLE,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProbeOutcome::Free => "free",
            ProbeOutcome::InUse => "in use",
            ProbeOutcome::Indeterminate => "indeterminate",
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// ReadinessOutcome
// ============================================================================

/// Terminal state of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadinessOutcome {
    /// The endpoint accepted a connection.
    Ready,
    /// The timeout elapsed without a listener appearing.
    TimedOut,
    /// No strategy could tell whether anything listens.
    ProbingUnavailable,
}

impl ReadinessOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessOutcome::Ready)
    }

    /// Process exit code: 0 ready, 1 timed out, 127 undecidable.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReadinessOutcome::Ready => 0,
            ReadinessOutcome::TimedOut => 1,
            ReadinessOutcome::ProbingUnavailable => crate::error::EXIT_PROBING_UNAVAILABLE,
        }
    }

    /// Turn a non-ready outcome into the matching error.
    pub fn into_result(self, endpoint: &Endpoint, timeout: Duration) -> Result<()> {
        match self {
            ReadinessOutcome::Ready => Ok(()),
            ReadinessOutcome::TimedOut => Err(Error::TimedOut {
                endpoint: endpoint.to_string(),
                timeout,
            }),
            ReadinessOutcome::ProbingUnavailable => Err(Error::ProbingUnavailable {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ReadinessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReadinessOutcome::Ready => "ready",
            ReadinessOutcome::TimedOut => "timed out",
            ReadinessOutcome::ProbingUnavailable => "probing unavailable",
        };
        f.write_str(name)
    }
}

// ============================================================================
// StrategyKind
// ============================================================================

/// The probing mechanisms known to the crate, in default preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Direct TCP connect.
    Connect,
    /// Listening-socket table via `ss` or `lsof`.
    SocketTable,
    /// Bash `/dev/tcp` redirection.
    ShellRedirect,
    /// `python` socket connect.
    Python,
    /// `python3` socket connect.
    Python3,
}

impl StrategyKind {
    /// All strategies in default preference order.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Connect,
        StrategyKind::SocketTable,
        StrategyKind::ShellRedirect,
        StrategyKind::Python,
        StrategyKind::Python3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Connect => "connect",
            StrategyKind::SocketTable => "socket-table",
            StrategyKind::ShellRedirect => "shell-redirect",
            StrategyKind::Python => "python",
            StrategyKind::Python3 => "python3",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown probe strategy '{}'", s)))
    }
}
