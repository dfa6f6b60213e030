//! CLI configuration: the shared loader plus `GlobalOpts` overrides.

use std::path::PathBuf;

pub use gatelink_config::{Config, config_path};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config` / `GATELINK_CONFIG`, else the
/// platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the config and apply flag overrides (flag > env > file).
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = gatelink_config::load_config_from(&config_file(global))?;

    if let Some(ref url) = global.api_url {
        cfg.api_url.clone_from(url);
    }
    if global.insecure {
        cfg.insecure = true;
    }

    Ok(cfg)
}
