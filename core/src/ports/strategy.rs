//! Probe strategy port (interface).

use async_trait::async_trait;

use crate::domain::{Endpoint, ProbeOutcome, StrategyKind};

/// One concrete mechanism for testing whether a port has a listener.
///
/// Strategies are held as trait objects in preference order, hence
/// `async_trait` rather than a native async fn.
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    /// Which mechanism this is.
    fn kind(&self) -> StrategyKind;

    /// Try to render a verdict.
    ///
    /// Returns `None` when the mechanism cannot run on this host or its
    /// result was ambiguous. A refused connection must be the only way to
    /// produce `Some(ProbeOutcome::Free)`.
    async fn attempt(&self, endpoint: &Endpoint) -> Option<ProbeOutcome>;
}
