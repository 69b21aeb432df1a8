//! Each host strategy on its own against a real loopback listener.
//!
//! A strategy whose tool is missing on this host answers `None` for the
//! live listener; those cases are skipped rather than failed.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use portgate_core::adapters::{RuntimeStrategy, ShellRedirectStrategy, SocketTableStrategy};
use portgate_core::{Endpoint, ProbeOutcome, ProbeStrategy};
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Look for a tool on `PATH` and in the sbin directories.
fn locate(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path)
        .chain(["/usr/sbin", "/sbin"].map(PathBuf::from))
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Live listener must read `InUse`; once it is closed the strategy must
/// never claim `InUse`, and must say `Free` when `closed_is_conclusive`.
async fn check_live_and_closed(strategy: &dyn ProbeStrategy, closed_is_conclusive: bool) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = Endpoint::new("127.0.0.1", listener.local_addr().unwrap().port()).unwrap();

    let live = strategy.attempt(&endpoint).await;
    if live.is_none() {
        eprintln!("{} cannot run on this host, skipping", strategy.kind());
        return;
    }
    assert_eq!(live, Some(ProbeOutcome::InUse), "{}", strategy.kind());

    drop(listener);
    let closed = strategy.attempt(&endpoint).await;
    if closed_is_conclusive {
        assert_eq!(closed, Some(ProbeOutcome::Free), "{}", strategy.kind());
    } else {
        assert_ne!(closed, Some(ProbeOutcome::InUse), "{}", strategy.kind());
    }
}

#[tokio::test]
async fn ss_sees_live_and_closed_ports() {
    let strategy = SocketTableStrategy::with_paths(locate("ss"), None, TIMEOUT);
    check_live_and_closed(&strategy, true).await;
}

#[tokio::test]
async fn lsof_sees_live_port() {
    let strategy = SocketTableStrategy::with_paths(None, locate("lsof"), TIMEOUT);
    // Without root lsof cannot vouch for a free port.
    let privileged = nix::unistd::geteuid().is_root();
    check_live_and_closed(&strategy, privileged).await;
}

#[tokio::test]
async fn bash_redirect_sees_live_and_closed_ports() {
    let strategy = ShellRedirectStrategy::new(TIMEOUT);
    check_live_and_closed(&strategy, true).await;
}

#[tokio::test]
async fn python_sees_live_and_closed_ports() {
    let strategy = RuntimeStrategy::python(Duration::from_secs(2), TIMEOUT);
    check_live_and_closed(&strategy, true).await;
}

#[tokio::test]
async fn python3_sees_live_and_closed_ports() {
    let strategy = RuntimeStrategy::python3(Duration::from_secs(2), TIMEOUT);
    check_live_and_closed(&strategy, true).await;
}
