//! `gatelink status`: pairing state, optionally checked against the backend.

use gatelink_core::NetworkEvent;

use crate::cli::StatusArgs;
use crate::config::Config;
use crate::error::CliError;

pub async fn handle(args: StatusArgs, cfg: &Config) -> Result<(), CliError> {
    let credentials = cfg.credential_store();
    let paired = credentials.has_credential();

    println!("api_url: {}", cfg.api_url);
    println!("paired:  {}", if paired { "yes" } else { "no" });

    if !args.verify {
        return Ok(());
    }
    if !paired {
        return Err(CliError::NotPaired);
    }

    let mut manager = super::build_manager(cfg, credentials)?;
    manager.handle_network_event(NetworkEvent::Available);
    let device = manager.verify().await?;

    println!("device:  {} ({})", device.name, device.id);
    for shocker in &device.shockers {
        println!(
            "  shocker {} rf_id={} model={}",
            shocker.id, shocker.rf_id, shocker.model
        );
    }
    Ok(())
}
