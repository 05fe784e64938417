//! Flag-aware configuration: merges the shared config file with CLI
//! overrides and builds the `Fleet` the commands run against.

use clap::ValueEnum;

use twinkly_config::Config;
use twinkly_core::{Fleet, JsonFileStore};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Load the config file named by `--config`, or the canonical one.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = match global.config {
        Some(ref path) => twinkly_config::load_config_from(path)?,
        None => twinkly_config::load_config()?,
    };

    if let Some(ref path) = global.registry {
        cfg.registry.path = Some(path.clone());
    }
    if let Some(timeout) = global.timeout {
        cfg.defaults.timeout = timeout;
    }
    Ok(cfg)
}

/// `--output`, falling back to `defaults.output`.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> Result<OutputFormat, CliError> {
    if let Some(format) = global.output {
        return Ok(format);
    }
    <OutputFormat as ValueEnum>::from_str(&cfg.defaults.output, true).map_err(|_| CliError::Validation {
        field: "defaults.output".into(),
        reason: format!("unknown output format '{}'", cfg.defaults.output),
    })
}

/// Open the registry and build the fleet.
pub fn build_fleet(cfg: &Config) -> Result<Fleet, CliError> {
    let fleet_config = twinkly_config::to_fleet_config(cfg)?;
    let path = cfg.registry_path();
    tracing::debug!(registry = %path.display(), "opening registry");

    let fleet = Fleet::new(fleet_config, Box::new(JsonFileStore::new(path)))?;
    Ok(fleet)
}
