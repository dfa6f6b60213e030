//! Clap derive structures for the `gatelink` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// gatelink -- keep a device connected to its control gateway
#[derive(Debug, Parser)]
#[command(
    name = "gatelink",
    version,
    about = "Keep a device connected to its remote control gateway",
    long_about = "Pairs this device with the backend, keeps one realtime gateway\n\
        session alive and executes the control commands it receives.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "GATELINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend API root (overrides the config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect to the gateway and execute commands until interrupted
    Run,

    /// Pair this device using a code from the web dashboard
    Pair(PairArgs),

    /// Forget the stored device credential
    Unpair,

    /// Show pairing state
    Status(StatusArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Pair code shown in the dashboard
    pub code: u32,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Check the stored credential against the backend
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
