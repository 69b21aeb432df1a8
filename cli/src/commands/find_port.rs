//! Find-port command - print a free port.

use anyhow::Result;
use portgate_core::{Config, PortAllocator, PortProbe};

use super::RangeArgs;

pub async fn run(config: &Config, range: &RangeArgs, json: bool) -> Result<i32> {
    let request = range.request(config)?;
    let allocator =
        PortAllocator::with_config(PortProbe::from_config(&config.probe), config.allocation.clone());

    let endpoint = allocator.allocate(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&endpoint)?);
    } else {
        println!("{}", endpoint.port());
    }
    Ok(0)
}
