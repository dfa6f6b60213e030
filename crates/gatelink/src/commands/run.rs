//! `gatelink run`: the long-lived daemon loop.

use std::sync::atomic::{AtomicBool, Ordering};

use gatelink_core::{
    CommandExecutor, CommandRejected, FeatureToggle, NetworkEvent, ShockerCommand,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::CliError;

/// Highest intensity a shocker accepts.
const MAX_INTENSITY: u8 = 100;

/// Executes commands by logging them. Hardware drivers plug in here.
#[derive(Debug, Default)]
pub struct LoggingExecutor;

impl CommandExecutor for LoggingExecutor {
    fn execute(&self, command: &ShockerCommand) -> Result<(), CommandRejected> {
        if command.intensity > MAX_INTENSITY {
            return Err(CommandRejected::new(format!(
                "intensity {} exceeds {MAX_INTENSITY}",
                command.intensity
            )));
        }

        info!(
            shocker_id = command.shocker_id,
            command = %command.command_type,
            intensity = command.intensity,
            duration_ms = command.duration_ms,
            model = command.model,
            "executing shocker command"
        );
        Ok(())
    }
}

/// Remembers the always-enabled feature state and logs changes.
#[derive(Debug, Default)]
pub struct LoggingToggle {
    enabled: AtomicBool,
}

impl FeatureToggle for LoggingToggle {
    fn set_always_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            info!(enabled, "always-enabled feature toggled");
        }
    }
}

pub async fn handle(cfg: &Config) -> Result<(), CliError> {
    let tick_interval = cfg.tick_interval()?;
    let credentials = cfg.credential_store();
    if !credentials.has_credential() {
        warn!("device is not paired, waiting for a credential");
    }
    let manager = super::build_manager(cfg, credentials)?;

    manager.register_connected_changed_handler(|connected| {
        if connected {
            info!("gateway session up");
        } else {
            info!("gateway session down");
        }
    });

    // This host has no link-state feed; the network counts as up for the
    // lifetime of the process.
    let (network, events) = mpsc::channel(4);
    network
        .send(NetworkEvent::Available)
        .await
        .map_err(|_| CliError::Api {
            message: "network event channel closed".into(),
        })?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        shutdown.cancel();
    });

    info!(api_url = %cfg.api_url, "starting gateway connection loop");
    manager.run(events, tick_interval, cancel).await;
    drop(network);

    Ok(())
}
