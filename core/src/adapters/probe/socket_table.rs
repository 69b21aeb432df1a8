//! Listening-socket table strategy using `ss` or `lsof`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::domain::{Endpoint, ProbeOutcome, StrategyKind};
use crate::ports::ProbeStrategy;

use super::tool::{find_executable, run_tool};
use super::utils::Utils;

/// Default paths to search for ss.
const SS_PATHS: &[&str] = &["/usr/sbin/ss", "/usr/bin/ss", "/sbin/ss", "/bin/ss"];

/// Default paths to search for lsof.
const LSOF_PATHS: &[&str] = &[
    "/usr/sbin/lsof",
    "/usr/bin/lsof",
    "/opt/homebrew/bin/lsof", // Apple Silicon
    "/usr/local/bin/lsof",    // Intel Mac / Homebrew
];

/// Answers from the OS connection table instead of connecting.
///
/// Only local endpoints can be answered this way. `ss` sees every socket on
/// the host; `lsof` only sees the caller's own processes unless it runs as
/// root, so an empty `lsof` answer is trusted only when privileged.
pub struct SocketTableStrategy {
    ss_path: Option<PathBuf>,
    lsof_path: Option<PathBuf>,
    command_timeout: Duration,
    privileged: bool,
}

impl SocketTableStrategy {
    /// Creates a strategy, searching for ss and lsof.
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            ss_path: find_executable(SS_PATHS, "ss"),
            lsof_path: find_executable(LSOF_PATHS, "lsof"),
            command_timeout,
            privileged: is_privileged(),
        }
    }

    /// Creates a strategy with custom tool paths.
    pub fn with_paths(
        ss_path: Option<PathBuf>,
        lsof_path: Option<PathBuf>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            ss_path,
            lsof_path,
            command_timeout,
            privileged: is_privileged(),
        }
    }

    /// Returns true if at least one inspection tool was found.
    pub fn is_available(&self) -> bool {
        self.ss_path.is_some() || self.lsof_path.is_some()
    }

    async fn query_ss(&self, port: u16) -> Option<ProbeOutcome> {
        let ss = self.ss_path.as_ref()?;
        let output = run_tool(ss, ["-Htln"], self.command_timeout).await?;
        if output.code != Some(0) {
            debug!(code = ?output.code, stderr = %output.stderr.trim(), "ss failed");
            return None;
        }
        let listening = parse_ss_listening_ports(&output.stdout)?;
        Some(if listening.contains(&port) {
            ProbeOutcome::InUse
        } else {
            ProbeOutcome::Free
        })
    }

    async fn query_lsof(&self, port: u16) -> Option<ProbeOutcome> {
        let lsof = self.lsof_path.as_ref()?;
        let output = run_tool(
            lsof,
            [
                "-nP".to_string(),
                format!("-iTCP:{}", port),
                "-sTCP:LISTEN".to_string(),
                "-t".to_string(),
            ],
            self.command_timeout,
        )
        .await?;
        interpret_lsof(output.code, &output.stdout, &output.stderr, self.privileged)
    }
}

impl Default for SocketTableStrategy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ProbeStrategy for SocketTableStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SocketTable
    }

    async fn attempt(&self, endpoint: &Endpoint) -> Option<ProbeOutcome> {
        if !self.is_available() {
            return None;
        }
        if !endpoint.is_local() {
            debug!(endpoint = %endpoint, "Socket table cannot answer for a remote host");
            return None;
        }

        if let Some(outcome) = self.query_ss(endpoint.port()).await {
            return Some(outcome);
        }
        self.query_lsof(endpoint.port()).await
    }
}

#[cfg(unix)]
fn is_privileged() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_privileged() -> bool {
    false
}

/// Extract listening ports from `ss -Htln` output.
///
/// Returns `None` if the output is non-empty but no line could be parsed.
fn parse_ss_listening_ports(output: &str) -> Option<Vec<u16>> {
    let regex = Regex::new(r"^\s*(\S+)\s+\d+\s+\d+\s+(\S+)\s+\S+").ok()?;

    let mut ports = Vec::new();
    let mut saw_content = false;
    let mut parsed_any = false;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        saw_content = true;

        let Some(caps) = regex.captures(line) else {
            continue;
        };
        parsed_any = true;

        if &caps[1] != "LISTEN" {
            continue;
        }
        if let Some((_, port)) = Utils::parse_address(&caps[2]) {
            ports.push(port);
        }
    }

    if saw_content && !parsed_any {
        return None;
    }
    ports.sort_unstable();
    ports.dedup();
    Some(ports)
}

/// Interpret `lsof -t` results.
///
/// Exit 0 with PIDs means a listener. Exit 1 with no output means nothing
/// matched, which is only conclusive when lsof can see every process.
fn interpret_lsof(code: Option<i32>, stdout: &str, stderr: &str, privileged: bool) -> Option<ProbeOutcome> {
    let has_pids = stdout.lines().any(|l| l.trim().parse::<u32>().is_ok());
    match code {
        Some(0) if has_pids => Some(ProbeOutcome::InUse),
        Some(1) if !has_pids && stderr.trim().is_empty() && privileged => Some(ProbeOutcome::Free),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SS_OUTPUT: &str = "\
LISTEN 0      4096   127.0.0.53%lo:53        0.0.0.0:*
LISTEN 0      128          0.0.0.0:22        0.0.0.0:*
LISTEN 0      511        127.0.0.1:7431      0.0.0.0:*
LISTEN 0      128             [::]:22           [::]:*
LISTEN 0      4096               *:9100            *:*
";

    #[test]
    fn test_parse_ss_output() {
        let ports = parse_ss_listening_ports(SS_OUTPUT).unwrap();
        assert_eq!(ports, vec![22, 53, 7431, 9100]);
    }

    #[test]
    fn test_parse_ss_empty_output() {
        let ports = parse_ss_listening_ports("").unwrap();
        assert!(ports.is_empty());
    }

    #[test]
    fn test_parse_ss_garbage_is_not_free() {
        assert!(parse_ss_listening_ports("ss: unknown option\n").is_none());
    }

    #[test]
    fn test_interpret_lsof() {
        assert_eq!(interpret_lsof(Some(0), "1234\n", "", false), Some(ProbeOutcome::InUse));
        assert_eq!(interpret_lsof(Some(1), "", "", true), Some(ProbeOutcome::Free));
        // Unprivileged lsof cannot see other users' sockets.
        assert_eq!(interpret_lsof(Some(1), "", "", false), None);
        assert_eq!(interpret_lsof(Some(1), "", "lsof: WARNING: can't stat()", true), None);
        assert_eq!(interpret_lsof(None, "", "", true), None);
    }

    #[tokio::test]
    async fn test_remote_host_is_skipped() {
        let strategy = SocketTableStrategy::default();
        let endpoint = Endpoint::new("10.1.2.3", 7000).unwrap();
        assert_eq!(strategy.attempt(&endpoint).await, None);
    }

    #[tokio::test]
    async fn test_missing_tools_cannot_run() {
        let strategy = SocketTableStrategy::with_paths(None, None, Duration::from_secs(1));
        assert!(!strategy.is_available());
        let endpoint = Endpoint::local(7000).unwrap();
        assert_eq!(strategy.attempt(&endpoint).await, None);
    }
}
