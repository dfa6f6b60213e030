// ── Runtime gateway configuration ──
//
// Describes *where* the backend lives and how the connection is tuned.
// Never touches disk: gatelink-config (or a test) builds a `GatewayConfig`
// and hands it in.

use std::time::Duration;

use gatelink_api::{TlsMode, TransportConfig};
use url::Url;

/// Default backend API root.
pub const DEFAULT_API_URL: &str = "https://api.shocklink.net";
/// Websocket path on the assigned gateway.
pub const GATEWAY_WS_PATH: &str = "/1/ws/device";
/// TLS port on the assigned gateway.
pub const GATEWAY_WS_PORT: u16 = 443;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (lab gateways with self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one device talking to one backend.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend API root (e.g., `https://api.shocklink.net`).
    pub api_url: Url,
    /// Firmware version string sent on the websocket handshake.
    pub firmware_version: String,
    /// TLS verification strategy for HTTP calls.
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Minimum spacing between heartbeats while connected.
    pub heartbeat_interval: Duration,
    /// Minimum spacing between gateway assignment attempts.
    pub reconnect_cooldown: Duration,
}

impl GatewayConfig {
    /// Config with default tuning for the given API root.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            firmware_version: env!("CARGO_PKG_VERSION").into(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_cooldown: Duration::from_secs(20),
        }
    }

    /// Translate into the api crate's transport settings.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }

    pub(crate) fn heartbeat_interval_ms(&self) -> u64 {
        duration_ms(self.heartbeat_interval)
    }

    pub(crate) fn reconnect_cooldown_ms(&self) -> u64 {
        duration_ms(self.reconnect_cooldown)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
