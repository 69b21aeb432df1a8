//! Direct TCP connect strategy.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::domain::{Endpoint, ProbeOutcome, StrategyKind};
use crate::ports::ProbeStrategy;

/// Verdict of a single connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectVerdict {
    Accepted,
    Refused,
    Unknown,
}

/// Probes by opening a TCP connection to every resolved address.
pub struct ConnectStrategy {
    connect_timeout: Duration,
}

impl ConnectStrategy {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect_once(&self, addr: SocketAddr) -> ConnectVerdict {
        match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => ConnectVerdict::Accepted,
            Ok(Err(e)) => classify_error(e.kind()),
            Err(_) => ConnectVerdict::Unknown,
        }
    }
}

impl Default for ConnectStrategy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

/// Map a connect error onto a verdict. Only an active refusal means free.
fn classify_error(kind: ErrorKind) -> ConnectVerdict {
    match kind {
        ErrorKind::ConnectionRefused => ConnectVerdict::Refused,
        // A reset or abort still proves something owns the port.
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => ConnectVerdict::Accepted,
        _ => ConnectVerdict::Unknown,
    }
}

/// Combine per-address verdicts: any acceptance wins, otherwise free only
/// if every address refused.
fn combine(verdicts: &[ConnectVerdict]) -> Option<ProbeOutcome> {
    if verdicts.is_empty() {
        return None;
    }
    if verdicts.contains(&ConnectVerdict::Accepted) {
        return Some(ProbeOutcome::InUse);
    }
    if verdicts.iter().all(|v| *v == ConnectVerdict::Refused) {
        return Some(ProbeOutcome::Free);
    }
    None
}

#[async_trait]
impl ProbeStrategy for ConnectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Connect
    }

    async fn attempt(&self, endpoint: &Endpoint) -> Option<ProbeOutcome> {
        let resolved = timeout(
            self.connect_timeout,
            lookup_host((endpoint.host(), endpoint.port())),
        )
        .await;

        let addrs: Vec<SocketAddr> = match resolved {
            Ok(Ok(addrs)) => addrs.collect(),
            Ok(Err(e)) => {
                debug!(endpoint = %endpoint, error = %e, "Could not resolve host");
                return None;
            }
            Err(_) => {
                debug!(endpoint = %endpoint, "Host resolution timed out");
                return None;
            }
        };

        let mut verdicts = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let verdict = self.connect_once(addr).await;
            debug!(%addr, ?verdict, "Connect attempt");
            if verdict == ConnectVerdict::Accepted {
                return Some(ProbeOutcome::InUse);
            }
            verdicts.push(verdict);
        }

        combine(&verdicts)
    }
}
