//! Probe command - check whether an endpoint has a listener.

use anyhow::Result;
use portgate_core::{Config, Endpoint, PortProbe, ProbeOutcome};
use serde_json::json;

pub async fn run(config: &Config, endpoint: &str, json: bool) -> Result<i32> {
    let endpoint: Endpoint = endpoint.parse()?;
    let probe = PortProbe::from_config(&config.probe);
    let outcome = probe.probe(&endpoint).await;

    if json {
        let value = json!({
            "endpoint": endpoint,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} {}", endpoint, outcome);
    }

    if outcome == ProbeOutcome::Indeterminate {
        let tried: Vec<String> = probe
            .strategy_kinds()
            .iter()
            .map(|k| k.to_string())
            .collect();
        eprintln!(
            "no probing mechanism could check {} (tried: {})",
            endpoint,
            tried.join(", ")
        );
    }

    Ok(outcome.exit_code())
}
