//! `gatelink config` subcommands.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_file(global).display());
        }
        ConfigCommand::Show => {
            let cfg = config::resolve(global)?;
            print!("{}", cfg.to_toml()?);
        }
    }
    Ok(())
}
