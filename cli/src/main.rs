//! portgate CLI - Allocate ports and wait for services on shared hosts
//!
//! A command-line driver for probing ports, picking a free one,
//! waiting for a service to listen, and launching a service on an
//! allocated port before running dependent work.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portgate")]
#[command(author, version, about = "Allocate ports and wait for services on shared hosts")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: $PORTGATE_CONFIG or ~/.portgate/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether something listens on HOST:PORT (exit 0 in use, 1 free, 127 unknown)
    Probe {
        /// Endpoint as HOST:PORT, [V6]:PORT or PORT
        endpoint: String,
    },

    /// Print a random port that is currently free
    #[command(alias = "find")]
    FindPort {
        #[command(flatten)]
        range: commands::RangeArgs,
    },

    /// Wait until something listens on HOST:PORT
    Wait {
        /// Endpoint as HOST:PORT, [V6]:PORT or PORT
        endpoint: String,

        #[command(flatten)]
        timing: commands::TimingArgs,
    },

    /// Launch a service on a free port, wait for it, then run dependent work
    Launch(commands::launch::LaunchArgs),

    /// Show the effective configuration
    Config {
        /// Write it to the configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            let code = e
                .downcast_ref::<portgate_core::Error>()
                .map(|e| e.exit_code())
                .unwrap_or(1);
            eprintln!("error: {:#}", e);
            exit_code(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = commands::load_config(cli.config.clone()).await?;

    match cli.command {
        Commands::Probe { endpoint } => commands::probe::run(&config, &endpoint, cli.json).await,
        Commands::FindPort { range } => commands::find_port::run(&config, &range, cli.json).await,
        Commands::Wait { endpoint, timing } => {
            commands::wait::run(&config, &endpoint, &timing, cli.json).await
        }
        Commands::Launch(args) => commands::launch::run(&config, args, cli.json).await,
        Commands::Config { init } => commands::config::run(cli.config, &config, init).await,
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the port or JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
