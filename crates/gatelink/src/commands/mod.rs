//! Command handlers. Each builds what it needs from the resolved config.

pub mod config_cmd;
pub mod pairing;
pub mod run;
pub mod status;

use std::sync::Arc;

use gatelink_core::{ConnectionManager, CredentialStore, MessageDispatcher};

use crate::config::Config;
use crate::error::CliError;

/// Build a manager wired to the configured credential backend and the
/// logging collaborators.
pub fn build_manager(
    cfg: &Config,
    credentials: Arc<dyn CredentialStore>,
) -> Result<ConnectionManager, CliError> {
    let gateway = cfg.to_gateway_config()?;
    let dispatcher = MessageDispatcher::new(
        Arc::new(run::LoggingExecutor),
        Arc::new(run::LoggingToggle::default()),
    );
    Ok(ConnectionManager::from_config(gateway, credentials, dispatcher)?)
}
