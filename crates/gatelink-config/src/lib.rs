//! Configuration for gatelink hosts.
//!
//! TOML settings layered under `GATELINK_*` environment variables,
//! translation to `gatelink_core::GatewayConfig`, and the keyring-backed
//! credential store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use gatelink_core::config::DEFAULT_API_URL;
use gatelink_core::{CredentialStore, GatewayConfig, MemoryCredentialStore, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Where the device credential is kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keyring (Secret Service, Keychain, Credential Manager).
    #[default]
    Keyring,
    /// Process memory only.
    Memory,
}

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Backend API root.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Version announced on the gateway handshake. Defaults to the
    /// binary's own version.
    pub firmware_version: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Spacing between manager ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Accept invalid TLS certificates (lab backends only).
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub credential_backend: CredentialBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            firmware_version: None,
            timeout_secs: default_timeout_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            insecure: false,
            ca_cert: None,
            credential_backend: CredentialBackend::default(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_tick_interval_ms() -> u64 {
    100
}

impl Config {
    /// Build the core's runtime config, validating as we go.
    pub fn to_gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        let api_url: url::Url = self.api_url.parse().map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", self.api_url),
        })?;

        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "api_url".into(),
                reason: format!("expected http or https, got '{}'", api_url.scheme()),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let tls = if self.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else {
            TlsVerification::SystemDefaults
        };

        let mut config = GatewayConfig::new(api_url);
        if let Some(ref version) = self.firmware_version {
            config.firmware_version.clone_from(version);
        }
        config.tls = tls;
        config.timeout = Duration::from_secs(self.timeout_secs);
        Ok(config)
    }

    /// Manager tick spacing. Zero is rejected.
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "tick_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(Duration::from_millis(self.tick_interval_ms))
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Open the configured credential backend.
    pub fn credential_store(&self) -> Arc<dyn CredentialStore> {
        match self.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
            CredentialBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "gatelink", "gatelink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gatelink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment. A missing file is fine.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GATELINK_"));

    Ok(figment.extract()?)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, cfg.to_toml()?)?;
    Ok(())
}

// ── Keyring credential store ────────────────────────────────────────

const KEYRING_SERVICE: &str = "gatelink";
const KEYRING_USER: &str = "device-token";

/// Device credential kept in the OS keyring.
///
/// Every operation is best effort: keyring failures are logged and read
/// as "no credential".
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
    user: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_entry(KEYRING_SERVICE, KEYRING_USER)
    }

    /// Store under a custom service/user pair (several devices on one host).
    pub fn with_entry(service: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            user: user.into(),
        }
    }

    fn entry(&self) -> Option<keyring::Entry> {
        match keyring::Entry::new(&self.service, &self.user) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(service = %self.service, error = %e, "keyring unavailable");
                None
            }
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn credential(&self) -> Option<SecretString> {
        match self.entry()?.get_password() {
            Ok(secret) if !secret.is_empty() => Some(SecretString::from(secret)),
            Ok(_) | Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "failed to read device credential from keyring");
                None
            }
        }
    }

    fn set_credential(&self, token: SecretString) {
        let Some(entry) = self.entry() else {
            return;
        };
        if let Err(e) = entry.set_password(token.expose_secret()) {
            warn!(error = %e, "failed to store device credential in keyring");
        }
    }

    fn clear_credential(&self) {
        let Some(entry) = self.entry() else {
            return;
        };
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "failed to remove device credential from keyring"),
        }
    }
}
