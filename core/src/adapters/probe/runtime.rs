//! Managed-runtime socket connect strategy (`python`, `python3`).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Endpoint, ProbeOutcome, StrategyKind};
use crate::ports::ProbeStrategy;

use super::tool::{find_executable, run_tool};

/// Exit 0: connected or reset. Exit 10: refused. Exit 12: anything else.
///
/// Runs on Python 2 and 3. An interpreter crash exits with 1, so 1 is
/// never a verdict.
const CONNECT_SCRIPT: &str = "\
import errno, socket, sys
try:
    socket.create_connection((sys.argv[1], int(sys.argv[2])), float(sys.argv[3])).close()
except socket.error as e:
    code = getattr(e, 'errno', None)
    if code == errno.ECONNREFUSED:
        sys.exit(10)
    if code in (errno.ECONNRESET, errno.ECONNABORTED):
        sys.exit(0)
    sys.exit(12)
except Exception:
    sys.exit(12)
";

const EXIT_REFUSED: i32 = 10;

/// Probes by asking a Python interpreter to connect.
pub struct RuntimeStrategy {
    kind: StrategyKind,
    interpreter: Option<PathBuf>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl RuntimeStrategy {
    /// Strategy backed by `python`.
    pub fn python(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            kind: StrategyKind::Python,
            interpreter: find_executable(&["/usr/bin/python", "/usr/local/bin/python"], "python"),
            connect_timeout,
            command_timeout,
        }
    }

    /// Strategy backed by `python3`.
    pub fn python3(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            kind: StrategyKind::Python3,
            interpreter: find_executable(
                &[
                    "/usr/bin/python3",
                    "/usr/local/bin/python3",
                    "/opt/homebrew/bin/python3",
                ],
                "python3",
            ),
            connect_timeout,
            command_timeout,
        }
    }

    /// Strategy with an explicit interpreter path.
    pub fn with_interpreter(
        kind: StrategyKind,
        interpreter: Option<PathBuf>,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            interpreter,
            connect_timeout,
            command_timeout,
        }
    }
}

#[async_trait]
impl ProbeStrategy for RuntimeStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn attempt(&self, endpoint: &Endpoint) -> Option<ProbeOutcome> {
        let interpreter = self.interpreter.as_ref()?;
        let port = endpoint.port().to_string();
        let connect_timeout = self.connect_timeout.as_secs_f64().to_string();

        let output = run_tool(
            interpreter,
            [
                "-c",
                CONNECT_SCRIPT,
                endpoint.host(),
                port.as_str(),
                connect_timeout.as_str(),
            ],
            self.command_timeout,
        )
        .await?;
        interpret_exit(output.code)
    }
}

fn interpret_exit(code: Option<i32>) -> Option<ProbeOutcome> {
    match code {
        Some(0) => Some(ProbeOutcome::InUse),
        Some(EXIT_REFUSED) => Some(ProbeOutcome::Free),
        _ => None,
    }
}
