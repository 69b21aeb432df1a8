//! End-to-end scenarios against real sockets on the loopback interface.

use std::time::{Duration, Instant};

use portgate_core::adapters::{
    ConnectStrategy, RuntimeStrategy, ShellRedirectStrategy, SocketTableStrategy,
};
use portgate_core::{
    AllocationRequest, Endpoint, Error, PortAllocator, PortProbe, ProbeOutcome, ProbeStrategy,
    ReadinessOutcome, ReadinessWaiter, StrategyKind, WaitRequest,
};
use rand::Rng;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

fn connect_only() -> PortProbe {
    let connect: Box<dyn ProbeStrategy> = Box::new(ConnectStrategy::new(Duration::from_millis(500)));
    PortProbe::with_strategies(vec![connect])
}

/// A probe whose every strategy is missing its tool.
fn blind_probe() -> PortProbe {
    let timeout = Duration::from_secs(1);
    let strategies: Vec<Box<dyn ProbeStrategy>> = vec![
        Box::new(SocketTableStrategy::with_paths(None, None, timeout)),
        Box::new(ShellRedirectStrategy::with_path(None, timeout)),
        Box::new(RuntimeStrategy::with_interpreter(StrategyKind::Python, None, timeout, timeout)),
        Box::new(RuntimeStrategy::with_interpreter(StrategyKind::Python3, None, timeout, timeout)),
    ];
    PortProbe::with_strategies(strategies)
}

/// A loopback port with nothing listening on it.
async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Bind `count - 1` consecutive ports and leave the last one of the run free.
async fn occupied_run(count: u16) -> (u16, Vec<TcpListener>) {
    for _ in 0..100 {
        let base: u16 = rand::thread_rng().gen_range(20_000..60_000);
        let mut listeners = Vec::new();
        for port in base..base + count {
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => listeners.push(listener),
                Err(_) => break,
            }
        }
        if listeners.len() == usize::from(count) {
            // Release the last port so exactly one in the run is free.
            listeners.pop();
            return (base, listeners);
        }
    }
    panic!("could not find {} consecutive free loopback ports", count);
}

#[tokio::test]
async fn probe_sees_live_and_closed_ports() {
    let probe = PortProbe::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
    assert_eq!(probe.probe(&endpoint).await, ProbeOutcome::InUse);

    drop(listener);
    assert_eq!(probe.probe(&endpoint).await, ProbeOutcome::Free);
}

#[tokio::test]
async fn allocate_finds_the_single_free_port() {
    let (base, _listeners) = occupied_run(6).await;
    let request = AllocationRequest::new("127.0.0.1", base, base + 5).unwrap();
    let allocator = PortAllocator::new(connect_only());

    let endpoint = assert_ok!(allocator.allocate(&request).await);
    assert_eq!(endpoint.port(), base + 5);
    assert_eq!(endpoint.host(), "127.0.0.1");
}

#[tokio::test]
async fn allocate_stays_in_range() {
    let allocator = PortAllocator::new(connect_only());
    let request = AllocationRequest::new("127.0.0.1", 40_000, 40_100).unwrap();

    for _ in 0..20 {
        let endpoint = assert_ok!(allocator.allocate(&request).await);
        assert!(request.contains(endpoint.port()));
    }
}

#[tokio::test]
async fn allocate_without_probes_is_unavailable() {
    let allocator = PortAllocator::new(blind_probe());
    let request = AllocationRequest::new("127.0.0.1", 7000, 11000).unwrap();

    let err = assert_err!(allocator.allocate(&request).await);
    assert!(matches!(err, Error::ProbingUnavailable { .. }));
    assert_eq!(err.exit_code(), 127);
}

#[tokio::test]
async fn wait_reports_ready_when_listener_appears() {
    let port = unused_port().await;
    let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
    let request = WaitRequest::from_secs(endpoint, 10.0, 0.1).unwrap();

    let server = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(listener);
    });

    let waiter = ReadinessWaiter::new(connect_only());
    assert_eq!(waiter.wait(&request).await, ReadinessOutcome::Ready);
    server.abort();
}

#[tokio::test]
async fn wait_times_out_after_the_deadline() {
    let port = unused_port().await;
    let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
    let request = WaitRequest::from_secs(endpoint, 2.0, 0.5).unwrap();
    let waiter = ReadinessWaiter::new(connect_only());

    let start = Instant::now();
    let outcome = waiter.wait(&request).await;
    let elapsed = start.elapsed();

    assert_eq!(outcome, ReadinessOutcome::TimedOut);
    assert!(elapsed >= Duration::from_secs(2), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "returned late: {elapsed:?}");
}

#[tokio::test]
async fn wait_without_probes_fails_immediately() {
    let endpoint = Endpoint::new("127.0.0.1", 7000).unwrap();
    let request = WaitRequest::from_secs(endpoint.clone(), 30.0, 0.5).unwrap();
    let waiter = ReadinessWaiter::new(blind_probe());

    let start = Instant::now();
    let outcome = waiter.wait(&request).await;

    assert_eq!(outcome, ReadinessOutcome::ProbingUnavailable);
    assert!(start.elapsed() < Duration::from_secs(2));

    let err = assert_err!(outcome.into_result(&endpoint, request.timeout()));
    assert_eq!(err.exit_code(), 127);
}
