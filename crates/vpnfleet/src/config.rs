//! CLI configuration: thin wrapper around `vpnfleet_config`.
//!
//! Resolves the file from `--config` and applies flag overrides on top of
//! what the file and environment say.

use std::path::PathBuf;
use std::time::Duration;

use vpnfleet_core::{NodeSettings, Pool};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use vpnfleet_config::{Config, config_path, load_config_from};

/// The config file in effect: `--config` / `VPNFLEET_CONFIG`, else the
/// platform default.
pub fn resolved_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the configuration file in effect.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = resolved_path(global);
    tracing::debug!(path = %path.display(), "using configuration");
    Ok(load_config_from(&path)?)
}

/// Node settings with `--timeout` applied.
pub fn node_settings(config: &Config, global: &GlobalOpts) -> Result<NodeSettings, CliError> {
    let mut node = config.node_settings();
    if let Some(seconds) = global.timeout {
        if seconds == 0 {
            return Err(CliError::Validation {
                field: "--timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        node.management_timeout = Duration::from_secs(seconds);
    }
    Ok(node)
}

/// Planned pools, failing when none are configured.
pub fn require_pools(config: &Config, global: &GlobalOpts) -> Result<Vec<Pool>, CliError> {
    let pools = config.pools()?;
    if pools.is_empty() {
        return Err(CliError::NothingConfigured {
            what: "pools".into(),
            path: resolved_path(global).display().to_string(),
        });
    }
    Ok(pools)
}
