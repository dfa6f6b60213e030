//! Connectivity core for a gateway-controlled device.
//!
//! This crate keeps one device session with the remote control gateway
//! alive and routes inbound control messages to local execution:
//!
//! - **[`ConnectionManager`]**: The driving loop. Hosts call
//!   [`tick()`](ConnectionManager::tick) repeatedly and forward network
//!   availability changes; the manager verifies the stored credential,
//!   builds a [`Session`], asks the backend for a gateway assignment and
//!   keeps the session connected.
//!
//! - **[`Session`]**: Explicit connection state machine
//!   (`Disconnected → Connecting → Connected → Disconnecting`) over a
//!   pollable [`RealtimeTransport`](gatelink_api::RealtimeTransport), with
//!   heartbeat timing.
//!
//! - **[`PairingClient`]**: Pair-code exchange, credential verification
//!   and unpairing against the gateway HTTP API.
//!
//! - **[`MessageDispatcher`]**: Decodes inbound envelopes and forwards
//!   shocker commands and feature toggles to host collaborators.
//!
//! - **[`ConnectionObservers`]**: Connected/disconnected notification
//!   fan-out with handle-based registration.

pub mod clock;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod flags;
pub mod manager;
pub mod observers;
pub mod pairing;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{GatewayConfig, TlsVerification};
pub use credential::{CredentialStore, MemoryCredentialStore};
pub use dispatch::{
    CommandExecutor, DecodeOutcome, Envelope, FeatureToggle, MessageDispatcher, ShockerCommand,
    ShockerCommandType,
};
pub use error::{CommandRejected, CoreError};
pub use flags::ConnectionFlags;
pub use manager::{ConnectionManager, NetworkEvent, TransportFactory};
pub use observers::{ConnectionObservers, HandlerId};
pub use pairing::PairingClient;
pub use session::{GatewayEndpoint, Session, SessionState};

pub use gatelink_api::{DeviceSelf, ShockerDescriptor};
