//! Launch a service on a freshly allocated port and gate dependent work on it.

use std::fs::OpenOptions;
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::AllocationConfig;
use crate::domain::{AllocationRequest, Endpoint, WaitRequest};
use crate::error::{Error, Result};
use crate::ports::Prober;

use super::{PortAllocator, ReadinessWaiter};

/// Grace period between SIGTERM and SIGKILL when stopping the service.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from an argv slice; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidRequest("command must not be empty".to_string()))?;
        Ok(Self::new(program.clone(), args.iter().cloned()))
    }

    /// Run a command line through `sh -c`.
    pub fn shell(command_line: impl Into<String>) -> Self {
        Self::new("sh", ["-c".to_string(), command_line.into()])
    }

    fn command(&self, env: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Everything needed to launch one service instance.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    /// The long-running service.
    pub service: CommandSpec,
    /// Work to run once the service listens.
    pub dependent: Option<CommandSpec>,
    /// Where to look for a free port. The host is also the readiness probe target.
    pub allocation: AllocationRequest,
    /// Address the service binds to, e.g. `0.0.0.0`.
    pub bind_host: String,
    /// Variables set to the bare port, e.g. `OLLAMA_PORT`.
    pub port_env: Vec<String>,
    /// Variables set to `BIND_HOST:PORT`, e.g. `OLLAMA_HOST`.
    pub address_env: Vec<String>,
    /// How long to wait for the service to listen.
    pub ready_timeout: Duration,
    /// Delay between readiness probes.
    pub poll_interval: Duration,
    /// Append service stdout/stderr to this file instead of inheriting them.
    pub service_log: Option<PathBuf>,
    /// Leave the service running after the dependent work and wait for it.
    pub keep_service: bool,
}

impl LaunchPlan {
    /// Environment handed to both the service and the dependent work.
    pub fn environment(&self, endpoint: &Endpoint) -> Result<Vec<(String, String)>> {
        let port = endpoint.port().to_string();
        let bind = Endpoint::new(self.bind_host.clone(), endpoint.port())?.to_bind_string();

        let mut env = Vec::with_capacity(self.port_env.len() + self.address_env.len());
        env.extend(self.port_env.iter().map(|k| (k.clone(), port.clone())));
        env.extend(self.address_env.iter().map(|k| (k.clone(), bind.clone())));
        Ok(env)
    }
}

/// Outcome of a successful launch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReport {
    /// The endpoint the service was bound to.
    pub endpoint: Endpoint,
    /// Environment exported to the service.
    pub environment: Vec<(String, String)>,
    /// Milliseconds from spawn until the service listened.
    pub ready_after_ms: u64,
    /// Exit code of the dependent work, if any ran.
    pub dependent_exit_code: Option<i32>,
    /// Exit code of the service if it ended while we waited on it.
    pub service_exit_code: Option<i32>,
}

impl LaunchReport {
    /// True when the dependent work (if any) exited with 0.
    pub fn succeeded(&self) -> bool {
        self.dependent_exit_code.map_or(true, |code| code == 0)
    }
}

/// Allocate, launch, wait, dispatch.
pub struct Launcher<P: Prober> {
    prober: P,
    allocation: AllocationConfig,
}

impl<P: Prober> Launcher<P> {
    pub fn new(prober: P, allocation: AllocationConfig) -> Self {
        Self { prober, allocation }
    }

    /// Run the plan to completion.
    ///
    /// Dropping the returned future kills the service.
    pub async fn launch(&self, plan: &LaunchPlan) -> Result<LaunchReport> {
        self.launch_until(plan, std::future::pending()).await
    }

    /// Run the plan until it completes or `shutdown` resolves.
    ///
    /// On shutdown the service is stopped the same way as after a normal
    /// run (SIGTERM, grace period, SIGKILL) and the launch fails with
    /// [`Error::Interrupted`].
    pub async fn launch_until<F>(&self, plan: &LaunchPlan, shutdown: F) -> Result<LaunchReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let allocator = PortAllocator::with_config(&self.prober, self.allocation.clone());
        let allocated = tokio::select! {
            allocated = allocator.allocate(&plan.allocation) => allocated,
            _ = &mut shutdown => {
                warn!("Launch interrupted during port allocation");
                return Err(Error::Interrupted("no service was started".to_string()));
            }
        };
        let endpoint = allocated.map_err(|e| {
            error!(
                host = plan.allocation.host(),
                min_port = plan.allocation.min_port(),
                max_port = plan.allocation.max_port(),
                error = %e,
                "Port allocation failed"
            );
            e
        })?;

        let environment = plan.environment(&endpoint)?;
        let request = WaitRequest::new(endpoint.clone(), plan.ready_timeout, plan.poll_interval)?;

        let mut service = spawn_service(plan, &environment)?;
        info!(
            endpoint = %endpoint,
            pid = ?service.id(),
            service = %plan.service,
            "Service started"
        );

        let started = Instant::now();
        let waiter = ReadinessWaiter::new(&self.prober);

        let outcome = tokio::select! {
            outcome = waiter.wait(&request) => Some(outcome),
            status = service.wait() => {
                let status = describe(status?);
                error!(endpoint = %endpoint, %status, "Service exited before it was ready");
                return Err(Error::ServiceExited { status });
            }
            _ = &mut shutdown => None,
        };
        let Some(outcome) = outcome else {
            return Err(interrupt(&mut service, &endpoint, "waiting for readiness").await);
        };

        if !outcome.is_ready() {
            error!(
                endpoint = %endpoint,
                outcome = %outcome,
                timeout_ms = plan.ready_timeout.as_millis() as u64,
                poll_interval_ms = plan.poll_interval.as_millis() as u64,
                "Service did not become ready"
            );
            stop_service(&mut service).await;
            outcome.into_result(&endpoint, plan.ready_timeout)?;
        }
        let ready_after_ms = started.elapsed().as_millis() as u64;

        let dependent_exit_code = match &plan.dependent {
            Some(dependent) => {
                let finished = tokio::select! {
                    code = run_dependent(dependent, &environment) => Some(code?),
                    _ = &mut shutdown => None,
                };
                match finished {
                    Some(code) => Some(code),
                    None => {
                        return Err(
                            interrupt(&mut service, &endpoint, "running dependent work").await
                        );
                    }
                }
            }
            None => None,
        };

        let service_exit_code = if plan.keep_service {
            info!(endpoint = %endpoint, "Waiting for service to exit");
            let status = tokio::select! {
                status = service.wait() => Some(status?),
                _ = &mut shutdown => None,
            };
            match status {
                Some(status) => status.code(),
                None => {
                    return Err(interrupt(&mut service, &endpoint, "waiting on the service").await);
                }
            }
        } else {
            stop_service(&mut service).await;
            None
        };

        Ok(LaunchReport {
            endpoint,
            environment,
            ready_after_ms,
            dependent_exit_code,
            service_exit_code,
        })
    }
}

async fn interrupt(service: &mut Child, endpoint: &Endpoint, stage: &str) -> Error {
    warn!(endpoint = %endpoint, stage, "Launch interrupted, stopping service");
    stop_service(service).await;
    Error::Interrupted(format!("service on {} stopped while {}", endpoint, stage))
}

fn spawn_service(plan: &LaunchPlan, environment: &[(String, String)]) -> Result<Child> {
    let mut cmd = plan.service.command(environment);
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    if let Some(log_path) = &plan.service_log {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| {
                Error::CommandFailed(format!(
                    "Failed to open service log {}: {}",
                    log_path.display(),
                    e
                ))
            })?;
        cmd.stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));
    }

    cmd.spawn().map_err(|e| {
        Error::CommandFailed(format!("Failed to start {}: {}", plan.service.program, e))
    })
}

async fn run_dependent(dependent: &CommandSpec, environment: &[(String, String)]) -> Result<i32> {
    info!(command = %dependent, "Dispatching dependent work");
    let status = dependent
        .command(environment)
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| Error::CommandFailed(format!("Failed to run {}: {}", dependent.program, e)))?;

    let code = status.code().unwrap_or(-1);
    if status.success() {
        info!(command = %dependent, "Dependent work finished");
    } else {
        warn!(command = %dependent, status = %describe(status), "Dependent work failed");
    }
    Ok(code)
}

/// SIGTERM, wait for the grace period, then SIGKILL.
async fn stop_service(service: &mut Child) {
    if let Ok(Some(status)) = service.try_wait() {
        debug!(status = %describe(status), "Service already exited");
        return;
    }

    #[cfg(unix)]
    if let Some(pid) = service.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        debug!(pid, "Sending SIGTERM to service");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid, error = %e, "Failed to send SIGTERM");
        }
        if let Ok(Ok(status)) = timeout(STOP_GRACE_PERIOD, service.wait()).await {
            debug!(pid, status = %describe(status), "Service stopped");
            return;
        }
    }

    if let Err(e) = service.kill().await {
        warn!(error = %e, "Failed to kill service");
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => status.to_string(),
    }
}
