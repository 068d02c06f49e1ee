//! `fanout config` – print the effective configuration.

use anyhow::{Context, Result};
use fanout_core::config::EngineConfig;

pub fn run_config(cfg: &EngineConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(cfg).context("render config")?;
    print!("{}", rendered);
    Ok(())
}
