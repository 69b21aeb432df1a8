//! Prober port (interface).

use std::sync::Arc;

use crate::domain::{Endpoint, ProbeOutcome};

/// Port for liveness probing.
///
/// The allocator and the readiness waiter only see this trait, so tests can
/// drive them with scripted outcomes instead of real sockets.
pub trait Prober: Send + Sync {
    /// Decide whether something currently listens on `endpoint`.
    fn probe(&self, endpoint: &Endpoint) -> impl std::future::Future<Output = ProbeOutcome> + Send;
}

impl<T: Prober + ?Sized> Prober for &T {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        (**self).probe(endpoint).await
    }
}

impl<T: Prober + ?Sized> Prober for Arc<T> {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        (**self).probe(endpoint).await
    }
}
