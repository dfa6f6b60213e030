// ── Core error types ──
//
// Domain errors from gatelink-core. Callers never match on HTTP details;
// the `From<gatelink_api::Error>` impl translates transport-layer errors
// into the failure classes the connection manager reacts to.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Preconditions ────────────────────────────────────────────────
    #[error("No network available")]
    NoNetwork,

    #[error("No device credential stored")]
    NoCredential,

    // ── Credential errors ────────────────────────────────────────────
    #[error("Device credential rejected by gateway")]
    InvalidCredential,

    #[error("Pairing rejected by gateway (HTTP {status}): {message}")]
    PairingRejected { status: u16, message: String },

    #[error("Gateway returned an empty credential")]
    EmptyCredential,

    // ── Gateway errors ───────────────────────────────────────────────
    #[error("Gateway error: {message}")]
    Gateway {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Cannot reach gateway: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Gateway request timed out")]
    Timeout,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// The credential is unambiguously bad and must be discarded.
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, Self::InvalidCredential)
    }

    /// Worth retrying after the cooldown without changing any state.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Gateway { .. } | Self::ConnectionFailed { .. } | Self::Timeout | Self::NoNetwork
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<gatelink_api::Error> for CoreError {
    fn from(err: gatelink_api::Error) -> Self {
        match err {
            gatelink_api::Error::InvalidDeviceToken => CoreError::InvalidCredential,
            gatelink_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Gateway {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            gatelink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            gatelink_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            gatelink_api::Error::Gateway { status, message } => CoreError::Gateway {
                message,
                status: Some(status),
            },
            gatelink_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            gatelink_api::Error::WebSocketNotConnected => CoreError::ConnectionFailed {
                reason: "WebSocket not connected".into(),
            },
            gatelink_api::Error::Deserialization { message, body: _ } => CoreError::Gateway {
                message: format!("Unreadable gateway reply: {message}"),
                status: Some(200),
            },
        }
    }
}

/// A command the executor refused or failed to carry out.
#[derive(Debug, Clone, Error)]
#[error("Command rejected: {reason}")]
pub struct CommandRejected {
    pub reason: String,
}

impl CommandRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_invalid_credential() {
        let err: CoreError = gatelink_api::Error::InvalidDeviceToken.into();
        assert!(err.is_invalid_credential());
        assert!(!err.is_transient());
    }

    #[test]
    fn gateway_status_is_kept() {
        let err: CoreError = gatelink_api::Error::Gateway {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Gateway { status: Some(500), .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn bad_body_is_transient_gateway_error() {
        let err: CoreError = gatelink_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        }
        .into();
        assert!(err.is_transient());
    }
}
