//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use gatelink_config::ConfigError;
use gatelink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the backend: {reason}")]
    #[diagnostic(
        code(gatelink::connection_failed),
        help(
            "Check the network and the configured api_url.\n\
             Self-signed lab backends need --insecure or ca_cert."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("No network available")]
    #[diagnostic(code(gatelink::no_network))]
    NoNetwork,

    #[error("Request timed out")]
    #[diagnostic(
        code(gatelink::timeout),
        help("Raise timeout_secs in the config file or check backend responsiveness.")
    )]
    Timeout,

    // ── Pairing ──────────────────────────────────────────────────────
    #[error("Device is not paired")]
    #[diagnostic(
        code(gatelink::not_paired),
        help("Pair with: gatelink pair <code>")
    )]
    NotPaired,

    #[error("Stored device credential was rejected and has been removed")]
    #[diagnostic(
        code(gatelink::invalid_credential),
        help("Pair again with: gatelink pair <code>")
    )]
    InvalidCredential,

    #[error("Pairing failed (HTTP {status}): {message}")]
    #[diagnostic(
        code(gatelink::pairing_rejected),
        help("Pair codes expire quickly. Generate a new one and retry.")
    )]
    PairingRejected { status: u16, message: String },

    // ── Backend ──────────────────────────────────────────────────────
    #[error("Backend error: {message}")]
    #[diagnostic(code(gatelink::api_error))]
    Api { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gatelink::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(gatelink::config),
        help("Show the config file location with: gatelink config path")
    )]
    Config(ConfigError),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NoNetwork => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::NotPaired | Self::InvalidCredential | Self::PairingRejected { .. } => {
                exit_code::AUTH
            }
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Api { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoNetwork => Self::NoNetwork,
            CoreError::NoCredential => Self::NotPaired,
            CoreError::InvalidCredential => Self::InvalidCredential,
            CoreError::PairingRejected { status, message } => {
                Self::PairingRejected { status, message }
            }
            CoreError::EmptyCredential => Self::PairingRejected {
                status: 200,
                message: "backend returned an empty credential".into(),
            },
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::Timeout => Self::Timeout,
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Gateway { message, .. } => Self::Api { message },
        }
    }
}
