//! Config command - show or write the effective configuration.

use std::path::PathBuf;

use anyhow::Result;
use portgate_core::{Config, ConfigStore};

pub async fn run(path: Option<PathBuf>, config: &Config, init: bool) -> Result<i32> {
    if init {
        let store = match path {
            Some(path) => ConfigStore::with_path(path),
            None => ConfigStore::new()?,
        };
        store.save(config).await?;
        eprintln!("wrote {}", store.path().display());
    }

    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(0)
}
