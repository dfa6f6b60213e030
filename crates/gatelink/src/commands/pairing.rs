//! `gatelink pair` and `gatelink unpair`.

use gatelink_core::NetworkEvent;

use crate::cli::PairArgs;
use crate::config::Config;
use crate::error::CliError;

pub async fn pair(args: PairArgs, cfg: &Config) -> Result<(), CliError> {
    let mut manager = super::build_manager(cfg, cfg.credential_store())?;
    manager.handle_network_event(NetworkEvent::Available);
    manager.pair(args.code).await?;

    println!("Paired with {}", cfg.api_url);
    Ok(())
}

pub fn unpair(cfg: &Config) -> Result<(), CliError> {
    let mut manager = super::build_manager(cfg, cfg.credential_store())?;
    manager.unpair();

    println!("Device credential removed");
    Ok(())
}
