//! Bash `/dev/tcp` redirection strategy.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::{Endpoint, ProbeOutcome, StrategyKind};
use crate::ports::ProbeStrategy;

use super::tool::{find_executable, run_tool, ToolOutput};

/// Default paths to search for bash.
const BASH_PATHS: &[&str] = &[
    "/bin/bash",
    "/usr/bin/bash",
    "/usr/local/bin/bash",
    "/opt/homebrew/bin/bash",
];

/// Marker compiled into bash builds that support network redirections.
const NET_REDIRECT_MARKER: &[u8] = b"/dev/tcp/*/*";

/// Host and port are positional parameters, never spliced into the script.
const REDIRECT_SCRIPT: &str = r#"exec 3<>"/dev/tcp/$1/$2""#;

/// Probes through the shell's native TCP redirection.
pub struct ShellRedirectStrategy {
    bash_path: Option<PathBuf>,
    command_timeout: Duration,
    supported: OnceCell<bool>,
}

impl ShellRedirectStrategy {
    /// Creates a strategy, searching for bash.
    pub fn new(command_timeout: Duration) -> Self {
        Self::with_path(find_executable(BASH_PATHS, "bash"), command_timeout)
    }

    /// Creates a strategy with a custom bash path.
    pub fn with_path(bash_path: Option<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            bash_path,
            command_timeout,
            supported: OnceCell::new(),
        }
    }

    /// Whether the bash build was compiled with `/dev/tcp` support.
    ///
    /// Checked once per strategy instance by scanning the binary.
    async fn is_supported(&self) -> bool {
        let Some(bash) = self.bash_path.as_ref() else {
            return false;
        };
        *self
            .supported
            .get_or_init(|| async {
                match tokio::fs::read(bash).await {
                    Ok(bytes) => contains_marker(&bytes),
                    Err(e) => {
                        debug!(bash = %bash.display(), error = %e, "Cannot inspect bash binary");
                        false
                    }
                }
            })
            .await
    }
}

impl Default for ShellRedirectStrategy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ProbeStrategy for ShellRedirectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ShellRedirect
    }

    async fn attempt(&self, endpoint: &Endpoint) -> Option<ProbeOutcome> {
        if !self.is_supported().await {
            return None;
        }
        let bash = self.bash_path.as_ref()?;

        let port = endpoint.port().to_string();
        let output = run_tool(
            bash,
            ["-c", REDIRECT_SCRIPT, "bash", endpoint.host(), port.as_str()],
            self.command_timeout,
        )
        .await?;
        interpret(&output)
    }
}

fn contains_marker(haystack: &[u8]) -> bool {
    haystack
        .windows(NET_REDIRECT_MARKER.len())
        .any(|w| w == NET_REDIRECT_MARKER)
}

fn interpret(output: &ToolOutput) -> Option<ProbeOutcome> {
    match output.code {
        Some(0) => Some(ProbeOutcome::InUse),
        Some(_) if output.stderr.contains("Connection refused") => Some(ProbeOutcome::Free),
        Some(_) if output.stderr.contains("Connection reset") => Some(ProbeOutcome::InUse),
        _ => None,
    }
}
