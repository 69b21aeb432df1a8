//! Waiting for a launched service to start listening.

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::domain::{ProbeOutcome, ReadinessOutcome, WaitRequest};
use crate::ports::Prober;

/// Polls an endpoint until something listens on it.
///
/// The wait future is cancel-safe: dropping it (on an outer timeout or a
/// shutdown signal) drops the in-flight probe, which closes its socket or
/// kills its helper process.
pub struct ReadinessWaiter<P: Prober> {
    prober: P,
}

impl<P: Prober> ReadinessWaiter<P> {
    pub fn new(prober: P) -> Self {
        Self { prober }
    }

    /// The prober used for polling.
    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Poll until the endpoint is in use, the timeout elapses, or probing
    /// turns out to be impossible.
    ///
    /// At least one probe is always made. `Indeterminate` ends the wait
    /// immediately: no amount of waiting makes a missing probe tool appear.
    pub async fn wait(&self, request: &WaitRequest) -> ReadinessOutcome {
        let endpoint = request.endpoint();
        let start = Instant::now();
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            match self.prober.probe(endpoint).await {
                ProbeOutcome::InUse => {
                    info!(
                        endpoint = %endpoint,
                        polls,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Endpoint is ready"
                    );
                    return ReadinessOutcome::Ready;
                }
                ProbeOutcome::Indeterminate => {
                    warn!(endpoint = %endpoint, polls, "Cannot probe endpoint, giving up");
                    return ReadinessOutcome::ProbingUnavailable;
                }
                ProbeOutcome::Free => {}
            }

            let elapsed = start.elapsed();
            if elapsed >= request.timeout() {
                warn!(
                    endpoint = %endpoint,
                    polls,
                    timeout_ms = request.timeout().as_millis() as u64,
                    "Endpoint did not become ready"
                );
                return ReadinessOutcome::TimedOut;
            }

            // Never sleep past the deadline.
            let remaining = request.timeout() - elapsed;
            let pause = request.poll_interval().min(remaining);
            debug!(endpoint = %endpoint, polls, ?pause, "Endpoint not listening yet");
            sleep(pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Endpoint;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Prober replaying a script, then repeating its last answer.
    struct ScriptedProber {
        script: Mutex<VecDeque<ProbeOutcome>>,
        last: ProbeOutcome,
        calls: Mutex<u32>,
    }

    impl ScriptedProber {
        fn new(script: impl IntoIterator<Item = ProbeOutcome>, last: ProbeOutcome) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                last,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    impl Prober for ScriptedProber {
        async fn probe(&self, _endpoint: &Endpoint) -> ProbeOutcome {
            *self.calls.lock() += 1;
            let next = self.script.lock().pop_front();
            next.unwrap_or(self.last)
        }
    }

    fn request(timeout_ms: u64, poll_ms: u64) -> WaitRequest {
        WaitRequest::new(
            Endpoint::local(7000).unwrap(),
            Duration::from_millis(timeout_ms),
            Duration::from_millis(poll_ms),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ready_after_a_few_polls() {
        use ProbeOutcome::*;
        let waiter = ReadinessWaiter::new(ScriptedProber::new([Free, Free, Free], InUse));

        let outcome = waiter.wait(&request(5_000, 10)).await;
        assert_eq!(outcome, ReadinessOutcome::Ready);
        assert_eq!(waiter.prober().calls(), 4);
    }

    #[tokio::test]
    async fn test_times_out_within_one_interval() {
        let waiter = ReadinessWaiter::new(ScriptedProber::new([], ProbeOutcome::Free));

        let start = std::time::Instant::now();
        let outcome = waiter.wait(&request(300, 50)).await;
        let elapsed = start.elapsed();

        assert_eq!(outcome, ReadinessOutcome::TimedOut);
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300 + 50 + 100), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_indeterminate_returns_immediately() {
        use ProbeOutcome::*;
        let waiter = ReadinessWaiter::new(ScriptedProber::new([Free, Indeterminate], Free));

        let start = std::time::Instant::now();
        let outcome = waiter.wait(&request(30_000, 10)).await;

        assert_eq!(outcome, ReadinessOutcome::ProbingUnavailable);
        assert_eq!(waiter.prober().calls(), 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_timeout_probes_once() {
        let waiter = ReadinessWaiter::new(ScriptedProber::new([], ProbeOutcome::Free));
        let outcome = waiter.wait(&request(0, 500)).await;
        assert_eq!(outcome, ReadinessOutcome::TimedOut);
        assert_eq!(waiter.prober().calls(), 1);

        let waiter = ReadinessWaiter::new(ScriptedProber::new([], ProbeOutcome::InUse));
        assert_eq!(waiter.wait(&request(0, 500)).await, ReadinessOutcome::Ready);
    }

    #[tokio::test]
    async fn test_wait_is_cancellable() {
        let waiter = ReadinessWaiter::new(ScriptedProber::new([], ProbeOutcome::Free));
        let result =
            tokio::time::timeout(Duration::from_millis(100), waiter.wait(&request(60_000, 20)))
                .await;
        assert!(result.is_err());
    }
}
