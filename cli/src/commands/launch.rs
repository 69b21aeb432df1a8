//! Launch command - run a service on a free port and gate work on it.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use portgate_core::error::EXIT_SERVICE_FAILED;
use portgate_core::{CommandSpec, Config, LaunchPlan, Launcher, PortProbe};
use tracing::warn;

use super::{RangeArgs, TimingArgs};

#[derive(Args, Debug)]
pub struct LaunchArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub timing: TimingArgs,

    /// Address the service should bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_host: String,

    /// Variable set to the allocated port (repeatable)
    #[arg(long = "port-env", value_name = "VAR")]
    pub port_env: Vec<String>,

    /// Variable set to BIND_HOST:PORT (repeatable)
    #[arg(long = "address-env", value_name = "VAR")]
    pub address_env: Vec<String>,

    /// Append service output to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Shell command to run once the service listens
    #[arg(long = "then", value_name = "COMMAND")]
    pub then: Option<String>,

    /// Keep the service running after the dependent command and wait for it
    #[arg(long)]
    pub keep: bool,

    /// Service command line
    #[arg(required = true, last = true, value_name = "SERVICE")]
    pub service: Vec<String>,
}

impl LaunchArgs {
    fn plan(self, config: &Config) -> Result<LaunchPlan> {
        let allocation = self.range.request(config)?;
        let (ready_timeout, poll_interval) = self.timing.durations(config)?;

        Ok(LaunchPlan {
            service: CommandSpec::from_argv(&self.service)?,
            dependent: self.then.map(CommandSpec::shell),
            allocation,
            bind_host: self.bind_host,
            port_env: self.port_env,
            address_env: self.address_env,
            ready_timeout,
            poll_interval,
            service_log: self.log,
            keep_service: self.keep,
        })
    }
}

pub async fn run(config: &Config, args: LaunchArgs, json: bool) -> Result<i32> {
    let plan = args.plan(config)?;
    let launcher = Launcher::new(
        PortProbe::from_config(&config.probe),
        config.allocation.clone(),
    );

    let report = launcher.launch_until(&plan, interrupted()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.endpoint);
        for (key, value) in &report.environment {
            println!("  {}={}", key, value);
        }
        println!("  ready after {}ms", report.ready_after_ms);
        if let Some(code) = report.dependent_exit_code {
            println!("  dependent exited with {}", code);
        }
        if let Some(code) = report.service_exit_code {
            println!("  service exited with {}", code);
        }
    }

    if report.succeeded() {
        Ok(0)
    } else {
        Ok(EXIT_SERVICE_FAILED)
    }
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("interrupted, stopping service");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: LaunchArgs,
    }

    #[test]
    fn test_parse_launch_args() {
        let harness = Harness::try_parse_from([
            "launch",
            "--min",
            "7000",
            "--max",
            "11000",
            "--port-env",
            "OLLAMA_PORT",
            "--address-env",
            "OLLAMA_HOST",
            "--then",
            "python worker.py",
            "--",
            "ollama",
            "serve",
        ])
        .unwrap();

        let plan = harness.args.plan(&Config::default()).unwrap();
        assert_eq!(plan.service.program, "ollama");
        assert_eq!(plan.service.args, vec!["serve"]);
        assert_eq!(plan.bind_host, "0.0.0.0");
        assert_eq!(plan.port_env, vec!["OLLAMA_PORT"]);
        assert_eq!(plan.address_env, vec!["OLLAMA_HOST"]);
        assert_eq!(plan.allocation.min_port(), 7000);
        assert_eq!(plan.allocation.max_port(), 11000);
        assert_eq!(plan.ready_timeout.as_secs(), 30);
        assert_eq!(
            plan.dependent.unwrap().args,
            vec!["-c".to_string(), "python worker.py".to_string()]
        );
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        let harness =
            Harness::try_parse_from(["launch", "--interval", "0", "--", "ollama", "serve"])
                .unwrap();
        assert!(harness.args.plan(&Config::default()).is_err());
    }

    #[test]
    fn test_service_is_required() {
        assert!(Harness::try_parse_from(["launch", "--keep"]).is_err());
    }
}
