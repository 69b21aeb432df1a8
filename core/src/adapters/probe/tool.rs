//! Locating and running external probe tools.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone)]
pub(crate) struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Finds an executable: first in the given absolute paths, then on `PATH`.
pub(crate) fn find_executable(paths: &[&str], name: &str) -> Option<PathBuf> {
    for path in paths {
        let path_buf = PathBuf::from(path);
        if is_executable(&path_buf) {
            return Some(path_buf);
        }
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs a tool with a hard deadline.
///
/// Returns `None` if the tool cannot be spawned or does not finish in time.
/// The child is killed when the future is dropped, so cancelling a probe
/// never leaves a stray process (or its open socket) behind.
pub(crate) async fn run_tool<I, S>(program: &Path, args: I, deadline: Duration) -> Option<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            debug!(program = %program.display(), error = %e, "Failed to spawn probe tool");
            return None;
        }
    };

    match timeout(deadline, child.wait_with_output()).await {
        Ok(Ok(output)) => Some(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) => {
            debug!(program = %program.display(), error = %e, "Probe tool failed");
            None
        }
        Err(_) => {
            debug!(program = %program.display(), ?deadline, "Probe tool timed out");
            None
        }
    }
}
