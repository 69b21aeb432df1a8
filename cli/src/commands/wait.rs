//! Wait command - block until an endpoint has a listener.

use anyhow::Result;
use portgate_core::{Config, Endpoint, PortProbe, ReadinessOutcome, ReadinessWaiter};
use serde::Serialize;

use super::TimingArgs;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WaitReport<'a> {
    endpoint: &'a Endpoint,
    outcome: ReadinessOutcome,
    timeout_secs: f64,
    poll_interval_secs: f64,
}

pub async fn run(config: &Config, endpoint: &str, timing: &TimingArgs, json: bool) -> Result<i32> {
    let endpoint: Endpoint = endpoint.parse()?;
    let request = timing.request(config, endpoint)?;
    let waiter = ReadinessWaiter::new(PortProbe::from_config(&config.probe));
    let tried: Vec<String> = waiter
        .prober()
        .strategy_kinds()
        .iter()
        .map(|k| k.to_string())
        .collect();

    let outcome = waiter.wait(&request).await;

    if json {
        let report = WaitReport {
            endpoint: request.endpoint(),
            outcome,
            timeout_secs: request.timeout().as_secs_f64(),
            poll_interval_secs: request.poll_interval().as_secs_f64(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} {}", request.endpoint(), outcome);
    }

    match outcome {
        ReadinessOutcome::Ready => {}
        ReadinessOutcome::TimedOut => eprintln!(
            "{} did not start listening within {:.1}s (polling every {:.1}s)",
            request.endpoint(),
            request.timeout().as_secs_f64(),
            request.poll_interval().as_secs_f64()
        ),
        ReadinessOutcome::ProbingUnavailable => eprintln!(
            "no probing mechanism could check {} (tried: {})",
            request.endpoint(),
            tried.join(", ")
        ),
    }

    Ok(outcome.exit_code())
}
