pub mod chain;
pub mod policies;
pub mod schedule;

use std::path::Path;

use anyhow::Context;
use inferlb_core::InferlbConfig;

/// Load the scheduler config, or the defaults when no path is given.
pub fn load_config(path: Option<&str>) -> anyhow::Result<InferlbConfig> {
    match path {
        Some(p) => InferlbConfig::from_file(Path::new(p)).with_context(|| format!("loading config {p}")),
        None => Ok(InferlbConfig::default()),
    }
}
