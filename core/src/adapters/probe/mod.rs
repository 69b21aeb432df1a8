//! Port probe adapters.
//!
//! [`PortProbe`] holds an ordered list of [`ProbeStrategy`] implementations
//! and asks them one after another until one renders a verdict.

mod connect;
mod runtime;
mod shell;
mod socket_table;
mod tool;
mod utils;

pub use connect::ConnectStrategy;
pub use runtime::RuntimeStrategy;
pub use shell::ShellRedirectStrategy;
pub use socket_table::SocketTableStrategy;

use std::time::Duration;

use tracing::debug;

use crate::config::ProbeConfig;
use crate::domain::{Endpoint, ProbeOutcome, StrategyKind};
use crate::ports::{ProbeStrategy, Prober};

/// Liveness probe over an ordered set of strategies.
///
/// Strategies run sequentially, cheapest first. A strategy answering `None`
/// is skipped; if none answers, the outcome is
/// [`ProbeOutcome::Indeterminate`]. Nothing is cached between calls.
pub struct PortProbe {
    strategies: Vec<Box<dyn ProbeStrategy>>,
}

impl PortProbe {
    /// Create a probe with every known strategy in default order.
    pub fn new() -> Self {
        Self::from_config(&ProbeConfig::default())
    }

    /// Create a probe from configuration (strategy order and timeouts).
    pub fn from_config(config: &ProbeConfig) -> Self {
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let command_timeout = Duration::from_millis(config.command_timeout_ms);

        let mut strategies: Vec<Box<dyn ProbeStrategy>> = Vec::new();
        for kind in &config.strategies {
            if strategies.iter().any(|s| s.kind() == *kind) {
                continue;
            }
            strategies.push(build_strategy(*kind, connect_timeout, command_timeout));
        }

        Self { strategies }
    }

    /// Create a probe with a custom strategy list, used in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn ProbeStrategy>>) -> Self {
        Self { strategies }
    }

    /// The configured strategy order.
    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Probe an endpoint.
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        for strategy in &self.strategies {
            match strategy.attempt(endpoint).await {
                Some(outcome) if outcome.is_definitive() => {
                    debug!(
                        endpoint = %endpoint,
                        strategy = %strategy.kind(),
                        outcome = %outcome,
                        "Probe verdict"
                    );
                    return outcome;
                }
                _ => {
                    debug!(endpoint = %endpoint, strategy = %strategy.kind(), "Strategy unavailable");
                }
            }
        }

        debug!(endpoint = %endpoint, "No strategy could probe endpoint");
        ProbeOutcome::Indeterminate
    }
}

impl Default for PortProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for PortProbe {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeOutcome {
        PortProbe::probe(self, endpoint).await
    }
}

fn build_strategy(
    kind: StrategyKind,
    connect_timeout: Duration,
    command_timeout: Duration,
) -> Box<dyn ProbeStrategy> {
    match kind {
        StrategyKind::Connect => Box::new(ConnectStrategy::new(connect_timeout)),
        StrategyKind::SocketTable => Box::new(SocketTableStrategy::new(command_timeout)),
        StrategyKind::ShellRedirect => Box::new(ShellRedirectStrategy::new(command_timeout)),
        StrategyKind::Python => Box::new(RuntimeStrategy::python(connect_timeout, command_timeout)),
        StrategyKind::Python3 => {
            Box::new(RuntimeStrategy::python3(connect_timeout, command_timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Scripted strategy that records when it is asked.
    struct MockStrategy {
        kind: StrategyKind,
        answer: Option<ProbeOutcome>,
        calls: Arc<Mutex<Vec<StrategyKind>>>,
    }

    impl MockStrategy {
        fn boxed(
            kind: StrategyKind,
            answer: Option<ProbeOutcome>,
            calls: &Arc<Mutex<Vec<StrategyKind>>>,
        ) -> Box<dyn ProbeStrategy> {
            Box::new(Self {
                kind,
                answer,
                calls: Arc::clone(calls),
            })
        }
    }

    #[async_trait]
    impl ProbeStrategy for MockStrategy {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        async fn attempt(&self, _endpoint: &Endpoint) -> Option<ProbeOutcome> {
            self.calls.lock().push(self.kind);
            self.answer
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::local(7000).unwrap()
    }

    #[tokio::test]
    async fn test_first_verdict_wins() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = PortProbe::with_strategies(vec![
            MockStrategy::boxed(StrategyKind::Connect, None, &calls),
            MockStrategy::boxed(StrategyKind::SocketTable, Some(ProbeOutcome::Free), &calls),
            MockStrategy::boxed(StrategyKind::Python3, Some(ProbeOutcome::InUse), &calls),
        ]);

        assert_eq!(probe.probe(&endpoint()).await, ProbeOutcome::Free);
        assert_eq!(
            *calls.lock(),
            vec![StrategyKind::Connect, StrategyKind::SocketTable]
        );
    }

    #[tokio::test]
    async fn test_indeterminate_answer_is_skipped() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = PortProbe::with_strategies(vec![
            MockStrategy::boxed(StrategyKind::Connect, Some(ProbeOutcome::Indeterminate), &calls),
            MockStrategy::boxed(StrategyKind::Python, Some(ProbeOutcome::InUse), &calls),
        ]);

        assert_eq!(probe.probe(&endpoint()).await, ProbeOutcome::InUse);
        assert_eq!(calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_all_unavailable_is_indeterminate() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let probe = PortProbe::with_strategies(vec![
            MockStrategy::boxed(StrategyKind::Connect, None, &calls),
            MockStrategy::boxed(StrategyKind::ShellRedirect, None, &calls),
        ]);

        assert_eq!(probe.probe(&endpoint()).await, ProbeOutcome::Indeterminate);
        assert_eq!(calls.lock().len(), 2);

        let empty = PortProbe::with_strategies(Vec::new());
        assert_eq!(empty.probe(&endpoint()).await, ProbeOutcome::Indeterminate);
    }

    #[test]
    fn test_from_config_order_and_dedup() {
        let config = ProbeConfig {
            strategies: vec![
                StrategyKind::Python3,
                StrategyKind::Connect,
                StrategyKind::Python3,
            ],
            ..ProbeConfig::default()
        };
        let probe = PortProbe::from_config(&config);
        assert_eq!(
            probe.strategy_kinds(),
            vec![StrategyKind::Python3, StrategyKind::Connect]
        );

        assert_eq!(PortProbe::new().strategy_kinds(), StrategyKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_real_listener_and_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = PortProbe::new();

        let live = Endpoint::new("127.0.0.1", port).unwrap();
        assert_eq!(probe.probe(&live).await, ProbeOutcome::InUse);

        drop(listener);
        assert_eq!(probe.probe(&live).await, ProbeOutcome::Free);
    }
}
